//! Environment-driven application configuration.
//!
//! LLM variables are read separately by `ai-llm-service`; everything else
//! the process needs lives here. An absent `FORGE_WEBHOOK_SECRET` disables
//! the inbound webhook surface (requests are rejected with 401).

use std::env;

use crate::error_handler::AppError;

fn must_env(name: &'static str) -> Result<String, AppError> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::MissingEnv(name)),
    }
}

fn opt_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_u16(name: &'static str, default: u16) -> Result<u16, AppError> {
    match opt_env(name) {
        Some(v) => v
            .parse::<u16>()
            .map_err(|_| AppError::BadEnv(name, "expected u16")),
        None => Ok(default),
    }
}

fn env_bool(name: &str) -> bool {
    matches!(
        opt_env(name).as_deref(),
        Some("1") | Some("true") | Some("TRUE") | Some("yes")
    )
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port the HTTP surface listens on.
    pub port: u16,
    /// Forge origin, e.g. `https://forge.example.com`.
    pub forge_host: String,
    pub forge_access_token: String,
    /// Shared secret for webhook auth; `None` disables inbound webhooks.
    pub webhook_secret: Option<String>,
    pub database_url: String,
    pub queue_host: String,
    pub queue_port: u16,
    pub queue_tls: bool,
    /// Parallel queue consumers in this process.
    pub worker_count: usize,
    /// When set, the pipeline runs without posting to the forge.
    pub dry_run: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            port: env_u16("PORT", 8080)?,
            forge_host: must_env("FORGE_HOST")?,
            forge_access_token: must_env("FORGE_ACCESS_TOKEN")?,
            webhook_secret: opt_env("FORGE_WEBHOOK_SECRET"),
            database_url: must_env("DATABASE_URL")?,
            queue_host: must_env("QUEUE_HOST")?,
            queue_port: env_u16("QUEUE_PORT", 6379)?,
            queue_tls: env_bool("QUEUE_TLS"),
            worker_count: opt_env("WORKER_COUNT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            dry_run: env_bool("REVIEW_DRY_RUN"),
        })
    }
}
