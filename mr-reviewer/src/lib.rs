//! Merge-request review pipeline.
//!
//! The path from a dequeued job to posted comments and a persisted review:
//!
//! 1. **Diff extraction**: cumulative diff between base/head, chunked with
//!    ±C context per changed region (`diff`)
//! 2. **Context assembly**: per-chunk file slices plus language-aware
//!    import extraction (`context`)
//! 3. **LLM review**: batching decision, prompt assembly, strict JSON
//!    extraction with bounded retries (`llm`)
//! 4. **Verification & posting**: false-positive filtering against real
//!    file content, severity-gated inline discussions, summary note, score,
//!    terminal row update (`verify`, `summary`, `pipeline`)
//!
//! The crate avoids `async-trait` and heap trait objects; collaborators are
//! concrete clients passed by reference, and failures are typed per layer
//! (see `errors`).

pub mod context;
pub mod diff;
pub mod errors;
pub mod llm;
pub mod pipeline;
pub mod summary;
pub mod types;
pub mod verify;

pub use errors::{Error, PipelineResult};
pub use pipeline::{ReviewTask, process_review_job};
pub use types::{Issue, IssueType, ReviewOutcome, Severity};
