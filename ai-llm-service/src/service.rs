//! Chat-completion service over the configured endpoint.
//!
//! Minimal, non-streaming client. One operation:
//! - [`LlmService::generate`]: system + user messages in, text body out,
//!   with token usage recorded for observability.
//!
//! Errors are normalized via the unified types in `error_handler`.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::LlmModelConfig;
use crate::error_handler::{LlmError, make_snippet};

/// Token accounting reported by the completion endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// One completed chat call.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// Thin client for the chat-completion endpoint.
#[derive(Debug)]
pub struct LlmService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
}

impl LlmService {
    /// Creates a service from a validated config.
    ///
    /// Builds an HTTP client with the API key as a default header. The
    /// deployment-scoped shape authenticates via `api-key`; the plain shape
    /// uses a bearer token.
    pub fn new(cfg: LlmModelConfig) -> Result<Self, LlmError> {
        let mut headers = header::HeaderMap::new();
        let auth_value = if cfg.deployment.is_some() {
            header::HeaderValue::from_str(&cfg.api_key)
        } else {
            header::HeaderValue::from_str(&format!("Bearer {}", cfg.api_key))
        }
        .map_err(|e| LlmError::Decode(format!("invalid API key header: {e}")))?;
        let auth_name = if cfg.deployment.is_some() {
            "api-key"
        } else {
            "authorization"
        };
        headers.insert(auth_name, auth_value);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .default_headers(headers)
            .build()?;

        let url_chat = cfg.chat_url();
        info!(
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            deployment = cfg.deployment.as_deref().unwrap_or("-"),
            timeout_secs = cfg.timeout_secs,
            "LlmService initialized"
        );

        Ok(Self {
            client,
            cfg,
            url_chat,
        })
    }

    /// Performs one non-streaming chat completion.
    ///
    /// # Errors
    /// - [`LlmError::HttpStatus`] for non-2xx responses
    /// - [`LlmError::HttpTransport`] for client/network failures
    /// - [`LlmError::Decode`] if the JSON cannot be parsed
    /// - [`LlmError::EmptyResponse`] if no non-empty choice is returned
    pub async fn generate(&self, system: &str, user: &str) -> Result<ChatOutcome, LlmError> {
        let started = Instant::now();
        let body = ChatCompletionRequest {
            model: &self.cfg.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_completion_tokens: self.cfg.max_completion_tokens,
        };

        debug!(
            model = %self.cfg.model,
            prompt_len = user.len(),
            "POST {}", self.url_chat
        );

        let resp = self.client.post(&self.url_chat).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);
            error!(
                status,
                %snippet,
                model = %self.cfg.model,
                latency_ms = started.elapsed().as_millis(),
                "chat completion returned non-success status"
            );
            return Err(LlmError::HttpStatus { status, snippet });
        }

        let out: ChatCompletionResponse = resp.json().await.map_err(|e| {
            LlmError::Decode(format!(
                "serde error: {e}; expected `choices[0].message.content`"
            ))
        })?;

        let usage = out.usage;
        let content = out
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        if let Some(u) = usage {
            info!(
                model = %self.cfg.model,
                prompt_tokens = u.prompt_tokens,
                completion_tokens = u.completion_tokens,
                total_tokens = u.total_tokens,
                latency_ms = started.elapsed().as_millis(),
                "chat completion completed"
            );
        } else {
            info!(
                model = %self.cfg.model,
                latency_ms = started.elapsed().as_millis(),
                "chat completion completed (no usage reported)"
            );
        }

        Ok(ChatOutcome { content, usage })
    }
}

/// Enabled/disabled dispatch so the SKIPPED path stays tidy.
///
/// Credentials absent → `Disabled`; every call then fails fast with
/// [`LlmError::Disabled`] and the orchestrator checks [`LlmClient::is_enabled`]
/// before starting work.
#[derive(Debug)]
pub enum LlmClient {
    Enabled(LlmService),
    Disabled,
}

impl LlmClient {
    /// Builds the client from the environment.
    pub fn from_env() -> Result<Self, crate::error_handler::ConfigError> {
        match LlmModelConfig::from_env()? {
            Some(cfg) => {
                let svc = LlmService::new(cfg).map_err(|e| {
                    error!(error = %e, "failed to construct LLM service");
                    crate::error_handler::ConfigError::InvalidFormat {
                        var: "LLM_ENDPOINT",
                        reason: "could not construct HTTP client",
                    }
                })?;
                Ok(LlmClient::Enabled(svc))
            }
            None => {
                info!("LLM credentials absent; client disabled, reviews will be skipped");
                Ok(LlmClient::Disabled)
            }
        }
    }

    /// Stable enabled check used by the orchestrator's SKIPPED path.
    pub fn is_enabled(&self) -> bool {
        matches!(self, LlmClient::Enabled(_))
    }

    /// Generate a completion, or fail fast when disabled.
    pub async fn generate(&self, system: &str, user: &str) -> Result<ChatOutcome, LlmError> {
        match self {
            LlmClient::Enabled(svc) => svc.generate(system, user).await,
            LlmClient::Disabled => Err(LlmError::Disabled),
        }
    }
}

/* ===========================================================================
HTTP payloads
======================================================================== */

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_shape_decodes_choices_and_usage() {
        let raw = r#"{
            "choices": [{"message": {"content": "{\"summary\":\"ok\",\"issues\":[]}"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(parsed.usage.unwrap().total_tokens, 19);
    }

    #[test]
    fn disabled_client_reports_disabled() {
        let client = LlmClient::Disabled;
        assert!(!client.is_enabled());
    }
}
