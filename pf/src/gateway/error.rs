//! Gateway error types and failure classification

use std::time::Duration;
use thiserror::Error;

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504 | 529)
}

/// Errors from calls to the external reasoning provider
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Provider error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Content policy rejection: {0}")]
    ContentPolicy(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    /// Transient failures are retried with backoff; permanent ones surface
    /// immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::RateLimited { .. } => true,
            GatewayError::Api { status, .. } => is_retryable_status(*status),
            GatewayError::Network(_) => true,
            GatewayError::Timeout(_) => true,
            GatewayError::Auth(_) => false,
            GatewayError::ContentPolicy(_) => false,
            GatewayError::InvalidRequest(_) => false,
        }
    }

    /// Get the provider-requested wait if this is a rate limit error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// HTTP status, when the provider returned one
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(
            GatewayError::RateLimited {
                retry_after: Duration::from_secs(30)
            }
            .is_retryable()
        );
        assert!(GatewayError::Timeout(Duration::from_secs(120)).is_retryable());
        assert!(
            GatewayError::Api {
                status: 503,
                message: "overloaded".to_string()
            }
            .is_retryable()
        );
        assert!(
            GatewayError::Api {
                status: 429,
                message: "slow down".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_permanent_errors_are_not_retryable() {
        assert!(!GatewayError::Auth("bad key".to_string()).is_retryable());
        assert!(!GatewayError::ContentPolicy("blocked".to_string()).is_retryable());
        assert!(!GatewayError::InvalidRequest("no input".to_string()).is_retryable());
        assert!(
            !GatewayError::Api {
                status: 400,
                message: "malformed".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_retry_after() {
        let err = GatewayError::RateLimited {
            retry_after: Duration::from_secs(42),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));
        assert_eq!(GatewayError::Timeout(Duration::from_secs(1)).retry_after(), None);
    }

    #[test]
    fn test_status_extraction() {
        let err = GatewayError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.status(), Some(502));
        assert_eq!(GatewayError::Auth("x".to_string()).status(), None);
    }
}
