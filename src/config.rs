use lootcase_api::{
    ApiConfig,
    client::DEFAULT_API_URL,
};
use lootcase_core::{
    ForceMode,
    RetryPolicy,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    io,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "~/.lootcase/config.json";
pub const DEFAULT_USER_ID: u64 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: RetryPolicy::DEFAULT_BASE_DELAY.as_millis() as u64,
            max_delay_ms: RetryPolicy::DEFAULT_MAX_DELAY.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
    }
}

/// How long a Stars deposit is watched on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3_000,
            timeout_ms: 10 * 60 * 1_000,
        }
    }
}

impl PaymentConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_url: String,
    pub user_id: u64,
    pub force_mode: ForceMode,
    pub request_timeout_ms: u64,
    pub retry: RetryConfig,
    pub payment: PaymentConfig,
    pub demo_dir: String,
    /// Host platform version; `None` when running outside a host.
    pub platform_version: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            user_id: DEFAULT_USER_ID,
            force_mode: ForceMode::Auto,
            request_timeout_ms: 10_000,
            retry: RetryConfig::default(),
            payment: PaymentConfig::default(),
            demo_dir: demo_store::DEMO_ROOT.to_string(),
            platform_version: None,
        }
    }
}

impl AppConfig {
    /// Loads `path` (or the default location). A missing file yields defaults.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let path = expand_path(path.unwrap_or(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_slice(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn api_config(&self) -> ApiConfig {
        let mut config = ApiConfig::new(self.api_url.clone());
        config.request_timeout = Duration::from_millis(self.request_timeout_ms);
        config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.policy()
    }

    pub fn demo_dir(&self) -> PathBuf {
        expand_path(&self.demo_dir)
    }
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn load_from__missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let config = AppConfig::load_from(&dir.path().join("config.json")).unwrap();

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn load_from__partial_file_keeps_other_defaults() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            br#"{ "api_url": "http://backend:9000/api", "force_mode": "fallback", "retry": { "max_attempts": 5 } }"#,
        )
        .unwrap();

        // when
        let config = AppConfig::load_from(&path).unwrap();

        // then
        assert_eq!(config.api_url, "http://backend:9000/api");
        assert_eq!(config.force_mode, ForceMode::Fallback);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.user_id, DEFAULT_USER_ID);
        assert_eq!(config.payment.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.payment.timeout(), Duration::from_secs(600));
    }

    #[test]
    fn load_from__malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{ nope").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn expand_path__leaves_plain_paths_alone() {
        assert_eq!(expand_path(".lootcase/demo"), PathBuf::from(".lootcase/demo"));
    }
}
