use lootcase_core::Transient;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build HTTP client for backend: {0}")]
    Client(#[source] reqwest::Error),
    #[error("could not connect to {url}: {source}")]
    Connect { url: String, source: reqwest::Error },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("invalid request to {url}: {source}")]
    Request { url: String, source: reqwest::Error },
    #[error("request to {url} failed: {source}")]
    Transport { url: String, source: reqwest::Error },
    #[error("backend responded with {status} for {url}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("invalid backend payload from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },
    #[error("backend rejected the request: {0}")]
    Rejected(String),
}

impl ApiError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            ApiError::Timeout { url }
        } else if err.is_connect() {
            ApiError::Connect { url, source: err }
        } else if err.is_builder() || err.is_redirect() || err.is_decode() {
            ApiError::Request { url, source: err }
        } else {
            ApiError::Transport { url, source: err }
        }
    }

    /// The request never reached the backend.
    pub fn is_connect(&self) -> bool {
        matches!(self, ApiError::Connect { .. })
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Client(_) => "client",
            ApiError::Connect { .. } => "connect",
            ApiError::Timeout { .. } => "timeout",
            ApiError::Request { .. } => "request",
            ApiError::Transport { .. } => "transport",
            ApiError::Status { .. } => "status",
            ApiError::Decode { .. } => "decode",
            ApiError::Rejected(_) => "rejected",
        }
    }

    /// The backend may have acted on the request even though no usable
    /// answer came back.
    pub fn may_have_reached_backend(&self) -> bool {
        match self {
            ApiError::Timeout { .. } | ApiError::Transport { .. } | ApiError::Decode { .. } => {
                true
            }
            ApiError::Status { status, .. } => status.is_server_error(),
            ApiError::Client(_)
            | ApiError::Connect { .. }
            | ApiError::Request { .. }
            | ApiError::Rejected(_) => false,
        }
    }
}

impl Transient for ApiError {
    fn is_transient(&self) -> bool {
        match self {
            ApiError::Connect { .. }
            | ApiError::Timeout { .. }
            | ApiError::Transport { .. } => true,
            ApiError::Status { status, .. } => matches!(
                *status,
                StatusCode::TOO_MANY_REQUESTS
                    | StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT
            ),
            ApiError::Client(_)
            | ApiError::Request { .. }
            | ApiError::Decode { .. }
            | ApiError::Rejected(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn status(code: u16) -> ApiError {
        ApiError::Status {
            url: "http://backend/cases/1".to_string(),
            status: StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        }
    }

    #[test]
    fn is_transient__gateway_and_throttling_statuses_are_retried() {
        assert!(status(429).is_transient());
        assert!(status(502).is_transient());
        assert!(status(503).is_transient());
        assert!(status(504).is_transient());
    }

    #[test]
    fn is_transient__client_errors_are_permanent() {
        assert!(!status(400).is_transient());
        assert!(!status(404).is_transient());
        assert!(!status(422).is_transient());
        assert!(!status(500).is_transient());
        assert!(!ApiError::Rejected("insufficient balance".into()).is_transient());
    }

    #[test]
    fn is_transient__decode_errors_are_permanent() {
        let source = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        let err = ApiError::Decode {
            url: "http://backend/health".to_string(),
            source,
        };

        assert!(!err.is_transient());
    }

    #[test]
    fn may_have_reached_backend__only_for_lost_or_garbled_answers() {
        let timeout = ApiError::Timeout {
            url: "http://backend/cases/7/open".to_string(),
        };

        assert!(timeout.may_have_reached_backend());
        assert!(status(500).may_have_reached_backend());
        assert!(!status(404).may_have_reached_backend());
        assert!(!ApiError::Rejected("Insufficient balance".into()).may_have_reached_backend());
        assert_eq!(timeout.kind(), "timeout");
    }
}
