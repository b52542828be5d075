//! Error types and env helpers for `ai-llm-service`.
//!
//! All error messages include the suffix `[AI LLM Service]` so that logs
//! and bubbled-up errors can be easily attributed to this library.

use thiserror::Error;

/// Runtime errors for LLM calls.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The client was constructed without credentials and cannot be called.
    #[error("[AI LLM Service] llm client is disabled (no credentials configured)")]
    Disabled,

    /// Transport-level failure (connect, timeout, TLS).
    #[error("[AI LLM Service] http transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),

    /// Non-2xx response from the completion endpoint.
    #[error("[AI LLM Service] http status {status}: {snippet}")]
    HttpStatus { status: u16, snippet: String },

    /// Response body could not be decoded into the expected shape.
    #[error("[AI LLM Service] decode error: {0}")]
    Decode(String),

    /// The endpoint answered but returned no choices / empty content.
    #[error("[AI LLM Service] empty completion response")]
    EmptyResponse,
}

impl LlmError {
    /// True for failures worth another attempt within a retry budget.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::HttpTransport(_) | LlmError::EmptyResponse => true,
            LlmError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            LlmError::Decode(_) | LlmError::Disabled => false,
        }
    }
}

/// Configuration errors raised while reading the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("[AI LLM Service] missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// Value had the wrong format (e.g., invalid URL).
    #[error("[AI LLM Service] invalid format in {var}: {reason}")]
    InvalidFormat {
        var: &'static str,
        reason: &'static str,
    },
}

/// Fetches a required, non-empty environment variable.
pub fn must_env(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// Fetches an optional environment variable (`None` if unset/empty).
pub fn opt_env(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        })
    }
}

/// Truncate a response body for error messages and logs.
pub fn make_snippet(body: &str) -> String {
    const MAX: usize = 300;
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        body.chars().take(MAX).collect::<String>() + "…"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(LlmError::EmptyResponse.is_retryable());
        assert!(
            LlmError::HttpStatus {
                status: 503,
                snippet: String::new()
            }
            .is_retryable()
        );
        assert!(
            LlmError::HttpStatus {
                status: 429,
                snippet: String::new()
            }
            .is_retryable()
        );
        assert!(
            !LlmError::HttpStatus {
                status: 401,
                snippet: String::new()
            }
            .is_retryable()
        );
        assert!(!LlmError::Decode("x".into()).is_retryable());
        assert!(!LlmError::Disabled.is_retryable());
    }

    #[test]
    fn endpoint_validation_rejects_bare_hosts() {
        assert!(validate_http_endpoint("LLM_ENDPOINT", "https://api.example.com").is_ok());
        assert!(validate_http_endpoint("LLM_ENDPOINT", "api.example.com").is_err());
    }
}
