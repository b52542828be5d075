//! LLM review calls with the retry-around-call-and-parse policy.
//!
//! A malformed response is only detectable after parsing, so the retry loop
//! wraps the whole call + parse. Exhaustion yields an **empty review**, not
//! an error: parse trouble must never fail the job.

pub mod parse;
pub mod prompt;

use ai_llm_service::LlmClient;
use tracing::{debug, warn};

use crate::diff::DiffChunk;
use crate::types::ReviewOutcome;
use parse::parse_review;
use prompt::{SYSTEM_PROMPT, build_batched_prompt, build_single_prompt};

/// Attempts per review call (transport error, empty body, or bad JSON all
/// consume one attempt).
const MAX_ATTEMPTS: u32 = 3;

/// Reviews one chunk. Issues that omit `file` inherit the chunk's filename.
pub async fn review_single(llm: &LlmClient, chunk: &DiffChunk) -> ReviewOutcome {
    if !llm.is_enabled() {
        return ReviewOutcome::empty();
    }
    let user = build_single_prompt(chunk);
    generate_with_retries(llm, &user, Some(&chunk.filename)).await
}

/// Reviews several chunks in one call; the prompt demands a `file` field
/// per issue.
pub async fn review_batched(llm: &LlmClient, chunks: &[DiffChunk]) -> ReviewOutcome {
    if !llm.is_enabled() || chunks.is_empty() {
        return ReviewOutcome::empty();
    }
    let user = build_batched_prompt(chunks);
    generate_with_retries(llm, &user, None).await
}

async fn generate_with_retries(
    llm: &LlmClient,
    user: &str,
    fallback_file: Option<&str>,
) -> ReviewOutcome {
    for attempt in 1..=MAX_ATTEMPTS {
        let raw = match llm.generate(SYSTEM_PROMPT, user).await {
            Ok(outcome) => outcome.content,
            Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                warn!(attempt, error = %e, "llm call failed; retrying");
                continue;
            }
            Err(e) => {
                warn!(attempt, error = %e, "llm call failed; returning empty review");
                return empty_with_notice();
            }
        };

        match parse_review(&raw, fallback_file) {
            Ok(outcome) => {
                debug!(attempt, issues = outcome.issues.len(), "llm review parsed");
                return outcome;
            }
            Err(e) => {
                warn!(attempt, error = %e, "llm response failed to parse");
            }
        }
    }
    empty_with_notice()
}

fn empty_with_notice() -> ReviewOutcome {
    ReviewOutcome {
        summary: "Automated review was unavailable for this change.".to_string(),
        issues: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk() -> DiffChunk {
        crate::diff::extract_chunks("a.ts", "a.ts", "@@ -1 +1 @@\n-x\n+y\n", 2).remove(0)
    }

    #[tokio::test]
    async fn disabled_client_yields_an_empty_review_without_calls() {
        let llm = LlmClient::Disabled;
        let outcome = review_single(&llm, &sample_chunk()).await;
        assert!(outcome.summary.is_empty());
        assert!(outcome.issues.is_empty());

        let outcome = review_batched(&llm, &[sample_chunk()]).await;
        assert!(outcome.issues.is_empty());
    }
}
