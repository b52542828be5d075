//! Error hierarchy for the forge REST adapter.
//!
//! Goals:
//! - Single error type for all client operations.
//! - Status-aware mapping (401→Unauthorized, 429→RateLimited, 5xx→Server, etc.).
//! - `is_transient()` drives the bounded retry loop in the client.

use thiserror::Error;

/// Convenient alias for forge-client results.
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Root error type for forge REST operations.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// Unauthorized (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden (HTTP 403).
    #[error("forbidden")]
    Forbidden,

    /// Not found (HTTP 404).
    #[error("not found")]
    NotFound,

    /// Rate limited (HTTP 429).
    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Gateway/Server error (HTTP 5xx).
    #[error("server error: status {0}")]
    Server(u16),

    /// Other HTTP status (4xx/3xx) not covered above.
    #[error("http status error: {0}")]
    HttpStatus(u16),

    /// Timeout at transport level.
    #[error("timeout")]
    Timeout,

    /// Network/transport failure without status (DNS/connect/reset).
    #[error("network error: {0}")]
    Network(String),

    /// JSON deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Unexpected/invalid shape of forge response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ForgeError {
    /// True for failures that may succeed on a fresh attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ForgeError::Timeout
                | ForgeError::Network(_)
                | ForgeError::Server(_)
                | ForgeError::RateLimited { .. }
        )
    }
}

impl From<reqwest::Error> for ForgeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ForgeError::Timeout;
        }
        if let Some(status) = e.status() {
            let code = status.as_u16();
            return match code {
                401 => ForgeError::Unauthorized,
                403 => ForgeError::Forbidden,
                404 => ForgeError::NotFound,
                429 => ForgeError::RateLimited {
                    retry_after_secs: None,
                },
                500..=599 => ForgeError::Server(code),
                _ => ForgeError::HttpStatus(code),
            };
        }
        ForgeError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_covers_server_and_transport() {
        assert!(ForgeError::Timeout.is_transient());
        assert!(ForgeError::Server(502).is_transient());
        assert!(ForgeError::Network("reset".into()).is_transient());
        assert!(
            ForgeError::RateLimited {
                retry_after_secs: None
            }
            .is_transient()
        );
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        assert!(!ForgeError::Unauthorized.is_transient());
        assert!(!ForgeError::NotFound.is_transient());
        assert!(!ForgeError::HttpStatus(400).is_transient());
        assert!(!ForgeError::InvalidResponse("bad".into()).is_transient());
    }
}
