use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Which path `FallbackExecutor` is allowed to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForceMode {
    /// Try primary, use fallback if it fails.
    #[default]
    Auto,
    /// Primary only; its failure is the caller's failure.
    Primary,
    /// Skip primary entirely.
    Fallback,
}

impl ForceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ForceMode::Auto => "auto",
            ForceMode::Primary => "primary",
            ForceMode::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ForceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown force mode '{0}'; expected auto, primary or fallback")]
pub struct UnknownForceMode(String);

impl FromStr for ForceMode {
    type Err = UnknownForceMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ForceMode::Auto),
            "primary" => Ok(ForceMode::Primary),
            "fallback" => Ok(ForceMode::Fallback),
            _ => Err(UnknownForceMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Primary,
    Fallback,
}

/// Value produced by `FallbackExecutor` and the path it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult<T> {
    pub value: T,
    pub source: Source,
}

impl<T> OperationResult<T> {
    pub fn primary(value: T) -> Self {
        Self {
            value,
            source: Source::Primary,
        }
    }

    pub fn fallback(value: T) -> Self {
        Self {
            value,
            source: Source::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == Source::Fallback
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationResult<U> {
        OperationResult {
            value: f(self.value),
            source: self.source,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FallbackOptions {
    pub force_mode: ForceMode,
}

impl FallbackOptions {
    pub fn new(force_mode: ForceMode) -> Self {
        Self { force_mode }
    }
}

/// Error from `FallbackExecutor::run_cancellable`.
#[derive(Debug, Error)]
pub enum FallbackError<E> {
    #[error(transparent)]
    Operation(E),
    #[error("primary operation was cancelled")]
    Cancelled,
}

/// Runs a primary operation and substitutes a fallback when it fails.
///
/// The executor recovers exactly one level: a failing fallback is returned to
/// the caller as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackExecutor {
    options: FallbackOptions,
}

impl FallbackExecutor {
    pub fn new(options: FallbackOptions) -> Self {
        Self { options }
    }

    pub fn with_mode(force_mode: ForceMode) -> Self {
        Self::new(FallbackOptions::new(force_mode))
    }

    pub fn options(&self) -> FallbackOptions {
        self.options
    }

    pub async fn run<T, E, P, PFut, F, FFut>(
        &self,
        primary: P,
        fallback: F,
    ) -> Result<OperationResult<T>, E>
    where
        P: FnOnce() -> PFut,
        PFut: Future<Output = Result<T, E>>,
        F: FnOnce() -> FFut,
        FFut: Future<Output = Result<T, E>>,
    {
        match self.options.force_mode {
            ForceMode::Fallback => fallback().await.map(OperationResult::fallback),
            ForceMode::Primary => primary().await.map(OperationResult::primary),
            ForceMode::Auto => match primary().await {
                Ok(value) => Ok(OperationResult::primary(value)),
                Err(_) => fallback().await.map(OperationResult::fallback),
            },
        }
    }

    /// Like `run`, but a cancelled primary counts as a failed one.
    ///
    /// Under `ForceMode::Primary` cancellation surfaces as
    /// `FallbackError::Cancelled`.
    pub async fn run_cancellable<T, E, P, PFut, F, FFut>(
        &self,
        primary: P,
        fallback: F,
        cancel: &CancellationToken,
    ) -> Result<OperationResult<T>, FallbackError<E>>
    where
        P: FnOnce() -> PFut,
        PFut: Future<Output = Result<T, E>>,
        F: FnOnce() -> FFut,
        FFut: Future<Output = Result<T, E>>,
    {
        match self.options.force_mode {
            ForceMode::Fallback => fallback()
                .await
                .map(OperationResult::fallback)
                .map_err(FallbackError::Operation),
            ForceMode::Primary => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(FallbackError::Cancelled),
                    res = primary() => res
                        .map(OperationResult::primary)
                        .map_err(FallbackError::Operation),
                }
            }
            ForceMode::Auto => {
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    res = primary() => res.ok(),
                };
                match outcome {
                    Some(value) => Ok(OperationResult::primary(value)),
                    None => fallback()
                        .await
                        .map(OperationResult::fallback)
                        .map_err(FallbackError::Operation),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use std::{
        future::pending,
        sync::atomic::{
            AtomicUsize,
            Ordering,
        },
    };

    #[tokio::test]
    async fn run__primary_failure_uses_fallback() {
        // given
        let executor = FallbackExecutor::default();

        // when
        let result = executor
            .run(
                || async { Err::<&str, _>("backend unreachable") },
                || async { Ok("demo") },
            )
            .await
            .unwrap();

        // then
        assert_eq!(result, OperationResult::fallback("demo"));
    }

    #[tokio::test]
    async fn run__primary_success_never_touches_fallback() {
        // given
        let executor = FallbackExecutor::default();
        let fallback_calls = AtomicUsize::new(0);
        let calls = &fallback_calls;

        // when
        let result = executor
            .run(
                || async { Ok::<_, String>("real") },
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("demo")
                },
            )
            .await
            .unwrap();

        // then
        assert_eq!(result, OperationResult::primary("real"));
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run__forced_fallback_skips_primary() {
        // given
        let executor = FallbackExecutor::with_mode(ForceMode::Fallback);
        let primary_calls = AtomicUsize::new(0);
        let calls = &primary_calls;

        // when
        let result = executor
            .run(
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>("real")
                },
                || async { Ok("demo") },
            )
            .await
            .unwrap();

        // then
        assert_eq!(result, OperationResult::fallback("demo"));
        assert_eq!(primary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run__forced_primary_propagates_failure() {
        // given
        let executor = FallbackExecutor::with_mode(ForceMode::Primary);
        let fallback_calls = AtomicUsize::new(0);
        let calls = &fallback_calls;

        // when
        let result = executor
            .run(
                || async { Err::<&str, _>("timeout".to_string()) },
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("demo")
                },
            )
            .await;

        // then
        assert_eq!(result, Err("timeout".to_string()));
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run__fallback_failure_propagates() {
        let executor = FallbackExecutor::default();

        let result = executor
            .run(
                || async { Err::<u32, _>("primary down") },
                || async { Err("fixtures missing") },
            )
            .await;

        assert_eq!(result, Err("fixtures missing"));
    }

    #[tokio::test]
    async fn run_cancellable__cancelled_primary_uses_fallback() {
        // given
        let executor = FallbackExecutor::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        // when
        let result = executor
            .run_cancellable(
                || pending::<Result<&str, String>>(),
                || async { Ok("demo") },
                &cancel,
            )
            .await
            .unwrap();

        // then
        assert_eq!(result, OperationResult::fallback("demo"));
    }

    #[tokio::test]
    async fn run_cancellable__cancelled_primary_is_reported_in_primary_mode() {
        let executor = FallbackExecutor::with_mode(ForceMode::Primary);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = executor
            .run_cancellable(
                || pending::<Result<&str, String>>(),
                || async { Ok("demo") },
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(FallbackError::Cancelled)));
    }

    #[tokio::test]
    async fn run_cancellable__uncancelled_primary_wins() {
        let executor = FallbackExecutor::default();
        let cancel = CancellationToken::new();

        let result = executor
            .run_cancellable(
                || async { Ok::<_, String>("real") },
                || async { Ok("demo") },
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(result.source, Source::Primary);
    }

    #[test]
    fn force_mode__parses_case_insensitively() {
        assert_eq!("AUTO".parse::<ForceMode>().unwrap(), ForceMode::Auto);
        assert_eq!(" primary ".parse::<ForceMode>().unwrap(), ForceMode::Primary);
        assert_eq!("fallback".parse::<ForceMode>().unwrap(), ForceMode::Fallback);
        assert!("demo".parse::<ForceMode>().is_err());
    }
}
