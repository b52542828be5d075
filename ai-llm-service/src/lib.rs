//! Chat-completion LLM adapter.
//!
//! One provider shape (chat completions over HTTP), two states:
//! - **Enabled**: credentials present; calls go out with a per-call timeout
//!   and token usage is logged.
//! - **Disabled**: credentials absent; `is_enabled()` is false and calls
//!   fail fast so the pipeline can mark reviews SKIPPED.
//!
//! Retry policy lives with the caller: a malformed *response* is only
//! detectable after parsing, so the retry loop wraps call + parse there.

pub mod config;
pub mod error_handler;
pub mod service;

pub use config::LlmModelConfig;
pub use error_handler::{ConfigError, LlmError};
pub use service::{ChatOutcome, LlmClient, LlmService, TokenUsage};
