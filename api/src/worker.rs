//! Queue consumers: N parallel workers per process, each driving the
//! review pipeline for one job at a time.

use std::sync::Arc;

use tracing::{error, info};

use mr_reviewer::{ReviewTask, process_review_job};
use review_queue::{Job, QueueWorker};

use crate::core::app_state::AppState;

/// Spawns `count` detached worker loops.
pub fn spawn_workers(state: Arc<AppState>, count: usize) {
    for worker_id in 0..count {
        let state = state.clone();
        tokio::spawn(async move {
            let worker = match QueueWorker::connect(state.queue_config.clone()).await {
                Ok(w) => w,
                Err(e) => {
                    error!(worker_id, error = %e, "queue worker failed to connect");
                    return;
                }
            };
            info!(worker_id, "queue worker started");

            let handler_state = state.clone();
            let result = worker
                .run(move |job| {
                    let state = handler_state.clone();
                    Box::pin(async move { handle_job(&state, job).await })
                        as std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), String>> + Send>>
                })
                .await;
            if let Err(e) = result {
                error!(worker_id, error = %e, "queue worker loop exited");
            }
        });
    }
}

/// Runs one delivery. On the final failed attempt the review is marked
/// FAILED before the job is handed back for dead-lettering.
async fn handle_job(state: &AppState, job: Job) -> Result<(), String> {
    let task = ReviewTask {
        review_id: job.payload.review_id.clone(),
        project_id: job.payload.project_id,
        merge_request_iid: job.payload.merge_request_iid,
    };

    match process_review_job(
        &state.db,
        &state.forge,
        &state.llm,
        &task,
        state.config.dry_run,
    )
    .await
    {
        Ok(()) => Ok(()),
        Err(e) => {
            if job.final_attempt {
                error!(review_id = %task.review_id, error = %e, "final attempt failed; marking review FAILED");
                if let Err(db_err) = state.db.fail_review(&task.review_id).await {
                    error!(review_id = %task.review_id, error = %db_err, "failed to mark review FAILED");
                }
            }
            Err(e.to_string())
        }
    }
}
