use thiserror::Error;

/// Application-wide error types for jobhunt.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Upstream answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    UpstreamStatus { status: u16, url: String },

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded (HTTP 429 or equivalent).
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Upstream payload could not be interpreted.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Missing credentials, invalid board id, bad settings.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTML-to-text conversion failed.
    #[error("Cleaner error: {0}")]
    CleanerError(String),

    /// LLM API call failed.
    #[error("LLM error (HTTP {status_code}): {message}")]
    LlmError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            AppError::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
            AppError::LlmError { retryable, .. } => *retryable,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            AppError::DatabaseError(_) => true,
            _ => false,
        }
    }

    /// Returns true if the error should slow down the rate limiter of the
    /// source that produced it.
    pub fn is_backpressure(&self) -> bool {
        match self {
            AppError::RateLimitExceeded | AppError::Timeout(_) | AppError::NetworkError(_) => true,
            AppError::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(AppError::NetworkError("reset".into()).is_retryable());
        assert!(AppError::Timeout(30).is_retryable());
        assert!(AppError::RateLimitExceeded.is_retryable());
        assert!(
            AppError::UpstreamStatus {
                status: 503,
                url: "https://boards-api.greenhouse.io".into(),
            }
            .is_retryable()
        );
        assert!(
            AppError::UpstreamStatus {
                status: 429,
                url: "https://api.lever.co".into(),
            }
            .is_retryable()
        );
        assert!(!AppError::ConfigError("bad board".into()).is_retryable());
        assert!(!AppError::ParseError("not json".into()).is_retryable());
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        let err = AppError::UpstreamStatus {
            status: 403,
            url: "https://api.ashbyhq.com".into(),
        };
        assert!(!err.is_retryable());
        assert!(!err.is_backpressure());
    }

    #[test]
    fn test_persistence_errors_retry_without_backpressure() {
        let err = AppError::DatabaseError("deadlock".into());
        assert!(err.is_retryable());
        assert!(!err.is_backpressure());
    }
}
