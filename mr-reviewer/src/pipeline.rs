//! Per-job review orchestration.
//!
//! One call of [`process_review_job`] drives a whole review:
//!
//! 1. mark the review PROCESSING (SKIPPED immediately when the LLM is off)
//! 2. fetch MR details; no `diff_refs` yet → COMPLETED("No changes to review")
//! 3. compare base..head, cap the file set, build chunks with ±10 context
//! 4. attach file context per chunk (fetch failures downgrade, not fail)
//! 5. one batched LLM call for small MRs, per-chunk calls otherwise
//! 6. verify issues against real file content, drop false positives
//! 7. inline discussions for critical/high/medium (failures swallowed)
//! 8. summary note after all inline attempts, then persist the terminal row
//!
//! Fatal errors (meta/diff fetch, persistence) bubble up so the queue can
//! retry; the worker marks the review FAILED once the budget is exhausted.

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use serde_json::json;
use tracing::{debug, info, warn};

use ai_llm_service::LlmClient;
use forge_client::ForgeClient;
use forge_client::types::{DiffRefs, InlinePosition};
use storage::Database;

use crate::context::{FileContext, fetch_file_context};
use crate::diff::{DiffChunk, extract_chunks};
use crate::errors::PipelineResult;
use crate::llm::{review_batched, review_single};
use crate::summary::{quality_score, render_inline_comment, render_summary};
use crate::types::{Issue, ReviewOutcome};
use crate::verify::IssueVerifier;

/// Context width the orchestrator asks the diff processor for.
pub const CONTEXT_LINES: usize = 10;

/// Context width for per-chunk file slices.
pub const FILE_CONTEXT_LINES: u32 = 10;

/// Cap on files considered per MR; the remainder feeds the summary warning.
pub const MAX_REVIEW_FILES: usize = 50;

/// Changed-line budget under which a multi-chunk MR is reviewed in one call.
pub const BATCH_CHANGED_LINE_LIMIT: u32 = 500;

/// Bounded fan-out for remote fetches and inline posts within one job.
const IN_JOB_CONCURRENCY: usize = 4;

/// One unit of work from the queue.
#[derive(Debug, Clone)]
pub struct ReviewTask {
    pub review_id: String,
    /// Forge-side numeric project id.
    pub project_id: u64,
    pub merge_request_iid: u64,
}

/// Runs the whole pipeline for one review job.
pub async fn process_review_job(
    db: &Database,
    forge: &ForgeClient,
    llm: &LlmClient,
    task: &ReviewTask,
    dry_run: bool,
) -> PipelineResult<()> {
    let review_id = task.review_id.as_str();
    info!(review_id, project_id = task.project_id, iid = task.merge_request_iid, "review job started");

    if !db.mark_processing(review_id).await? {
        info!(review_id, "review is already terminal; nothing to do");
        return Ok(());
    }

    if !llm.is_enabled() {
        info!(review_id, "llm disabled; marking review skipped");
        db.skip_review(review_id, &json!({"message": "LLM is not configured"}))
            .await?;
        return Ok(());
    }

    // MR details give us the SHA triple everything downstream binds to.
    let details = forge
        .get_merge_request(task.project_id, task.merge_request_iid)
        .await?;
    let Some(diff_refs) = details.diff_refs else {
        info!(review_id, "no diff refs yet; completing with empty review");
        db.complete_review(review_id, 100, 0, 0, &json!({"message": "No changes to review"}))
            .await?;
        return Ok(());
    };

    let mut diffs = forge
        .compare_commits(task.project_id, &diff_refs.base_sha, &diff_refs.head_sha)
        .await?;

    let skipped_files = diffs.len().saturating_sub(MAX_REVIEW_FILES);
    if skipped_files > 0 {
        warn!(review_id, total = diffs.len(), skipped = skipped_files, "large MR; capping file set");
        diffs.truncate(MAX_REVIEW_FILES);
    }
    let reviewed_files = diffs.len();

    let mut chunks: Vec<DiffChunk> = diffs
        .iter()
        .filter(|f| !f.deleted_file)
        .filter_map(|f| f.diff.as_deref().map(|d| (f, d)))
        .flat_map(|(f, d)| extract_chunks(&f.old_path, &f.new_path, d, CONTEXT_LINES))
        .collect();

    if chunks.is_empty() {
        info!(review_id, "no reviewable chunks; marking review skipped");
        db.skip_review(review_id, &json!({"message": "No reviewable changes"}))
            .await?;
        return Ok(());
    }
    debug!(review_id, chunks = chunks.len(), "chunks extracted");

    attach_file_contexts(forge, task.project_id, &diff_refs.head_sha, &mut chunks).await;

    let outcome = run_llm_review(llm, &chunks).await;
    debug!(review_id, issues = outcome.issues.len(), "llm review finished");

    let retained = verify_issues(forge, task, &diff_refs.head_sha, &chunks, outcome.issues).await;

    post_inline_comments(forge, task, &diff_refs, &chunks, &retained, dry_run).await;

    let score = quality_score(&retained);
    let summary = render_summary(
        &outcome.summary,
        &retained,
        score,
        skipped_files,
        reviewed_files,
    );
    if dry_run {
        info!(review_id, score, "dry run; skipping summary note post");
    } else if let Err(e) = forge
        .post_mr_note(task.project_id, task.merge_request_iid, &summary)
        .await
    {
        warn!(review_id, error = %e, "summary note post failed; completing anyway");
    }

    db.complete_review(
        review_id,
        score as i64,
        retained.len() as i64,
        retained.len() as i64,
        &json!({ "issues": retained }),
    )
    .await?;

    info!(review_id, score, issues = retained.len(), "review job completed");
    Ok(())
}

/// Fetches a ±10 line slice per chunk, keyed on the first changed line.
/// Failures log and leave the chunk without context.
async fn attach_file_contexts(
    forge: &ForgeClient,
    project_id: u64,
    head_sha: &str,
    chunks: &mut [DiffChunk],
) {
    let mut context_futs: Vec<
        std::pin::Pin<Box<dyn std::future::Future<Output = (usize, Option<FileContext>)> + Send + '_>>,
    > = Vec::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if chunk.changed_lines.is_empty() {
            continue;
        }
        context_futs.push(Box::pin(async move {
            match fetch_file_context(
                forge,
                project_id,
                &chunk.filename,
                head_sha,
                chunk.changed_lines[0],
                FILE_CONTEXT_LINES,
            )
            .await
            {
                Ok(ctx) => (i, Some(ctx)),
                Err(e) => {
                    warn!(file = %chunk.filename, error = %e, "context fetch failed; continuing without");
                    (i, None)
                }
            }
        }));
    }
    let fetched: Vec<(usize, Option<FileContext>)> = stream::iter(context_futs)
        .buffer_unordered(IN_JOB_CONCURRENCY)
        .collect()
        .await;

    for (i, ctx) in fetched {
        chunks[i].file_context = ctx;
    }
}

/// Batch decision: one call for small multi-chunk MRs, per-chunk otherwise.
async fn run_llm_review(llm: &LlmClient, chunks: &[DiffChunk]) -> ReviewOutcome {
    let total_changed: u32 = chunks.iter().map(|c| c.additions + c.deletions).sum();
    if total_changed <= BATCH_CHANGED_LINE_LIMIT && chunks.len() > 1 {
        debug!(total_changed, chunks = chunks.len(), "using batched review");
        return review_batched(llm, chunks).await;
    }

    debug!(total_changed, chunks = chunks.len(), "using per-chunk review");
    let mut summaries: Vec<String> = Vec::new();
    let mut issues: Vec<Issue> = Vec::new();
    for chunk in chunks {
        let outcome = review_single(llm, chunk).await;
        if !outcome.summary.trim().is_empty() {
            summaries.push(outcome.summary);
        }
        issues.extend(outcome.issues);
    }
    summaries.dedup();
    ReviewOutcome {
        summary: summaries.join(" "),
        issues,
    }
}

/// Runs the verifier per issue and keeps only the survivors.
async fn verify_issues(
    forge: &ForgeClient,
    task: &ReviewTask,
    head_sha: &str,
    chunks: &[DiffChunk],
    issues: Vec<Issue>,
) -> Vec<Issue> {
    let mut context_by_file: HashMap<&str, &FileContext> = HashMap::new();
    for chunk in chunks {
        if let Some(ctx) = chunk.file_context.as_ref() {
            context_by_file.entry(chunk.filename.as_str()).or_insert(ctx);
        }
    }

    let verifier = IssueVerifier::new(forge, task.project_id, head_sha);
    let mut retained = Vec::with_capacity(issues.len());
    for issue in issues {
        let ctx = context_by_file.get(issue.file.as_str()).copied();
        let verdict = verifier.verify(&issue, ctx).await;
        if verdict.is_valid {
            retained.push(issue);
        } else {
            info!(
                file = %issue.file,
                line = issue.line,
                reason = %verdict.reason,
                "dropping false positive"
            );
        }
    }
    retained
}

/// Posts inline discussions for gating severities with bounded fan-out.
/// Every failure is swallowed: inline posts never fail the job.
async fn post_inline_comments(
    forge: &ForgeClient,
    task: &ReviewTask,
    diff_refs: &DiffRefs,
    chunks: &[DiffChunk],
    retained: &[Issue],
    dry_run: bool,
) {
    let mut old_path_by_file: HashMap<&str, &str> = HashMap::new();
    for chunk in chunks {
        old_path_by_file
            .entry(chunk.filename.as_str())
            .or_insert(chunk.old_path.as_str());
    }

    let mut posts: Vec<std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>>> = Vec::new();
    for issue in retained
        .iter()
        .filter(|i| i.severity.posts_inline() && i.line >= 1)
    {
        let old_path = old_path_by_file
            .get(issue.file.as_str())
            .copied()
            .unwrap_or(issue.file.as_str());
        let position = InlinePosition {
            old_path: old_path.to_string(),
            new_path: issue.file.clone(),
            new_line: issue.line,
            base_sha: diff_refs.base_sha.clone(),
            head_sha: diff_refs.head_sha.clone(),
            start_sha: diff_refs.start_sha.clone(),
        };
        posts.push(Box::pin(async move {
            if dry_run {
                info!(file = %issue.file, line = issue.line, "dry run; skipping inline post");
                return;
            }
            match forge
                .post_inline_discussion(
                    task.project_id,
                    task.merge_request_iid,
                    &render_inline_comment(issue),
                    &position,
                )
                .await
            {
                Ok(id) => debug!(discussion_id = %id, file = %issue.file, line = issue.line, "inline posted"),
                Err(e) => warn!(file = %issue.file, line = issue.line, error = %e, "inline post failed; continuing"),
            }
        }));
    }

    stream::iter(posts)
        .buffer_unordered(IN_JOB_CONCURRENCY)
        .collect::<Vec<()>>()
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(additions: u32, deletions: u32) -> DiffChunk {
        DiffChunk {
            filename: "a.ts".into(),
            old_path: "a.ts".into(),
            language: "typescript".into(),
            diff_text: String::new(),
            additions,
            deletions,
            changed_lines: vec![1],
            file_context: None,
        }
    }

    /// The batch decision itself, extracted for table tests.
    fn is_batched(chunks: &[DiffChunk]) -> bool {
        let total: u32 = chunks.iter().map(|c| c.additions + c.deletions).sum();
        total <= BATCH_CHANGED_LINE_LIMIT && chunks.len() > 1
    }

    #[test]
    fn batch_decision_table() {
        // (chunk sizes, expected batched)
        let rows: Vec<(Vec<(u32, u32)>, bool)> = vec![
            (vec![(8, 2), (3, 1)], true),       // small multi-chunk MR
            (vec![(8, 2)], false),              // single chunk is never batched
            (vec![(400, 101), (10, 0)], false), // over the changed-line budget
            (vec![(250, 249), (1, 0)], true),   // exactly at the budget
        ];
        for (sizes, expected) in rows {
            let chunks: Vec<DiffChunk> = sizes.iter().map(|&(a, d)| chunk(a, d)).collect();
            assert_eq!(is_batched(&chunks), expected, "sizes: {sizes:?}");
        }
    }

    #[tokio::test]
    async fn per_chunk_path_with_disabled_llm_stays_empty() {
        let llm = LlmClient::Disabled;
        let outcome = run_llm_review(&llm, &[chunk(1, 0)]).await;
        assert!(outcome.issues.is_empty());
    }

    #[tokio::test]
    async fn disabled_llm_marks_the_review_skipped() {
        use storage::models::{ReviewStatus, WebhookIntake};

        let db = Database::in_memory().await.unwrap();
        let outcome = db
            .record_webhook(&WebhookIntake {
                forge_project_id: 42,
                project_name: "billing".into(),
                project_namespace: "acme".into(),
                default_webhook_secret: "s3cret".into(),
                forge_user_id: 7,
                username: "jdoe".into(),
                developer_name: "J. Doe".into(),
                email: None,
                avatar_url: None,
                merge_request_id: 1001,
                merge_request_iid: 12,
                title: "Fix rounding".into(),
                description: None,
                source_url: "https://forge.example.com/acme/billing/-/merge_requests/12".into(),
                source_branch: "fix/rounding".into(),
                target_branch: "main".into(),
            })
            .await
            .unwrap();

        // The forge points nowhere; the skipped path must not touch it.
        let forge = ForgeClient::new("http://127.0.0.1:9", "token".into()).unwrap();
        let llm = LlmClient::Disabled;
        let task = ReviewTask {
            review_id: outcome.review_id.clone(),
            project_id: 42,
            merge_request_iid: 12,
        };

        process_review_job(&db, &forge, &llm, &task, false)
            .await
            .unwrap();

        let row = db.get_review(&outcome.review_id).await.unwrap();
        assert_eq!(row.status().unwrap(), ReviewStatus::Skipped);
        assert!(row.review_content.contains("LLM is not configured"));
    }
}
