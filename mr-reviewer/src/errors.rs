//! Crate-wide error hierarchy for the review pipeline.
//!
//! Three failure layers with distinct policies:
//! - fatal pipeline failures (diff/meta fetch, persistence) bubble up and
//!   fail the job;
//! - LLM trouble (transport, empty, bad JSON) is absorbed into an empty
//!   review after the retry budget;
//! - inline-post and context-fetch failures are logged and swallowed at the
//!   call site, never raised.

use thiserror::Error;

/// Convenient alias for pipeline results.
pub type PipelineResult<T> = Result<T, Error>;

/// Root error type for the mr-reviewer crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Forge REST failure on a fatal path (diff or MR-details fetch).
    #[error(transparent)]
    Forge(#[from] forge_client::errors::ForgeError),

    /// LLM failure that escaped the absorb-into-empty-review policy.
    #[error(transparent)]
    Llm(#[from] ai_llm_service::LlmError),

    /// Persistence failure; fails the job so the queue can retry.
    #[error(transparent)]
    Storage(#[from] storage::errors::StorageError),

    /// JSON handling outside the LLM response path.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
