//! Environment-driven configuration for the chat-completion client.

use crate::error_handler::{ConfigError, must_env, opt_env, validate_http_endpoint};

/// Default completion budget sent with every request.
pub const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 40_000;

/// Configuration for the chat-completion endpoint.
///
/// `deployment` and `api_version` select the deployment-scoped URL shape
/// (`/openai/deployments/{deployment}/chat/completions?api-version=…`);
/// without a deployment the plain `/v1/chat/completions` path is used.
#[derive(Debug, Clone)]
pub struct LlmModelConfig {
    /// Inference endpoint origin (e.g. `https://llm.example.com`).
    pub endpoint: String,
    /// API key sent with every request.
    pub api_key: String,
    /// Optional deployment name for deployment-scoped endpoints.
    pub deployment: Option<String>,
    /// Model identifier submitted in the request body.
    pub model: String,
    /// API version query parameter for deployment-scoped endpoints.
    pub api_version: Option<String>,
    /// Completion token budget.
    pub max_completion_tokens: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl LlmModelConfig {
    /// Reads config from the environment.
    ///
    /// Returns `Ok(None)` when credentials are absent: the caller is
    /// expected to run with a disabled client and mark reviews SKIPPED.
    ///
    /// # Errors
    /// Fails only on *present but malformed* values (bad endpoint scheme).
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let (Some(endpoint), Some(api_key)) = (opt_env("LLM_ENDPOINT"), opt_env("LLM_KEY")) else {
            return Ok(None);
        };
        validate_http_endpoint("LLM_ENDPOINT", &endpoint)?;

        let model = must_env("LLM_MODEL_NAME")?;
        Ok(Some(Self {
            endpoint,
            api_key,
            deployment: opt_env("LLM_DEPLOYMENT"),
            model,
            api_version: opt_env("LLM_API_VERSION"),
            max_completion_tokens: DEFAULT_MAX_COMPLETION_TOKENS,
            timeout_secs: 120,
        }))
    }

    /// Final chat-completions URL for this config.
    pub fn chat_url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        match &self.deployment {
            Some(dep) => {
                let version = self.api_version.as_deref().unwrap_or("2024-06-01");
                format!(
                    "{}/openai/deployments/{}/chat/completions?api-version={}",
                    base, dep, version
                )
            }
            None => format!("{}/v1/chat/completions", base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(deployment: Option<&str>, api_version: Option<&str>) -> LlmModelConfig {
        LlmModelConfig {
            endpoint: "https://llm.example.com/".into(),
            api_key: "k".into(),
            deployment: deployment.map(str::to_string),
            model: "gpt-test".into(),
            api_version: api_version.map(str::to_string),
            max_completion_tokens: DEFAULT_MAX_COMPLETION_TOKENS,
            timeout_secs: 120,
        }
    }

    #[test]
    fn plain_endpoint_uses_v1_path() {
        assert_eq!(
            cfg(None, None).chat_url(),
            "https://llm.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn deployment_endpoint_carries_api_version() {
        assert_eq!(
            cfg(Some("rev"), Some("2024-10-21")).chat_url(),
            "https://llm.example.com/openai/deployments/rev/chat/completions?api-version=2024-10-21"
        );
    }
}
