//! Inbound webhook: authenticate, validate, persist, enqueue.
//!
//! Ordering matters: token auth runs before any body inspection, the three
//! database writes share one transaction, and the enqueue happens only
//! after that transaction commits. An enqueue failure leaves the review
//! PENDING and still returns 200: operations can see and requeue it.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info, instrument, warn};

use review_queue::ReviewJob;
use storage::models::WebhookIntake;

use crate::core::{
    app_state::AppState, http::response_envelope::ErrorEnvelope,
    security::constant_time_token_eq,
};
use crate::routes::webhooks::{
    forge_webhook_request::{ForgeWebhookPayload, should_skip, validate},
    forge_webhook_response::ForgeWebhookResponse,
};

/// Event type this endpoint processes; anything else is acknowledged as
/// `{processed:false}`.
const MERGE_REQUEST_EVENT: &str = "Merge Request Hook";

#[instrument(name = "forge_webhook_route", skip(state, headers, payload))]
pub async fn forge_webhook_route(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ForgeWebhookPayload>, JsonRejection>,
) -> Response {
    if let Some(id) = headers.get("X-Request-Id").and_then(|h| h.to_str().ok()) {
        debug!(%id, "request id attached");
    }

    // --- Authenticate before touching the body -----------------------------
    let Some(expected) = state.config.webhook_secret.as_deref() else {
        error!("webhook secret is not configured; rejecting delivery");
        return ErrorEnvelope::new("UNAUTHORIZED", "Webhook secret is not configured.")
            .into_response_with_status(StatusCode::UNAUTHORIZED);
    };
    let token = headers
        .get("X-Forge-Token")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    if token.is_empty() || !constant_time_token_eq(token, expected) {
        return ErrorEnvelope::new("UNAUTHORIZED", "Invalid webhook token.")
            .into_response_with_status(StatusCode::UNAUTHORIZED);
    }

    // --- Event filter -------------------------------------------------------
    let event = headers
        .get("X-Forge-Event")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    if event != MERGE_REQUEST_EVENT {
        debug!(%event, "ignoring non merge-request event");
        return (StatusCode::OK, Json(ForgeWebhookResponse::ignored())).into_response();
    }

    // --- Body shape ---------------------------------------------------------
    let payload = match payload {
        Ok(Json(p)) => p,
        Err(rejection) => {
            return ErrorEnvelope::new("BAD_REQUEST", rejection.to_string())
                .into_response_with_status(StatusCode::BAD_REQUEST);
        }
    };
    let sections = match validate(&payload) {
        Ok(sections) => sections,
        Err(field) => {
            return ErrorEnvelope::new("BAD_REQUEST", format!("invalid payload field: {field}"))
                .into_response_with_status(StatusCode::BAD_REQUEST);
        }
    };
    let (attrs, project, user) = (sections.attrs, sections.project, sections.user);

    if should_skip(attrs) {
        info!(
            iid = attrs.iid,
            wip = attrs.work_in_progress,
            action = attrs.action.as_deref().unwrap_or("-"),
            "delivery accepted but skipped"
        );
        return (StatusCode::OK, Json(ForgeWebhookResponse::skipped(attrs.iid))).into_response();
    }

    // --- Persist (one transaction) -----------------------------------------
    let intake = WebhookIntake {
        forge_project_id: project.id as i64,
        project_name: project.name.clone(),
        project_namespace: project.namespace.clone(),
        default_webhook_secret: expected.to_string(),
        forge_user_id: user.id,
        username: user.username.clone(),
        developer_name: user.name.clone(),
        email: user.email.clone(),
        avatar_url: user.avatar_url.clone(),
        merge_request_id: attrs.id,
        merge_request_iid: attrs.iid as i64,
        title: attrs.title.clone(),
        description: attrs.description.clone(),
        source_url: attrs.url.clone(),
        source_branch: attrs.source_branch.clone(),
        target_branch: attrs.target_branch.clone(),
    };

    let outcome = match state.db.record_webhook(&intake).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, iid = attrs.iid, "webhook persistence failed");
            return ErrorEnvelope::new("DATABASE_ERROR", "Failed to persist the review.")
                .into_response_with_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    // --- Enqueue after commit ----------------------------------------------
    let job = ReviewJob {
        review_id: outcome.review_id.clone(),
        project_id: project.id,
        merge_request_iid: attrs.iid,
    };
    match state.queue.enqueue(&job).await {
        Ok(job_id) => {
            info!(
                review_id = %outcome.review_id,
                job_id = %job_id,
                created = outcome.created,
                iid = attrs.iid,
                "review enqueued"
            );
        }
        Err(e) => {
            // The review row stays PENDING and is visible to operations.
            warn!(review_id = %outcome.review_id, error = %e, "enqueue failed; review left pending");
        }
    }

    (
        StatusCode::OK,
        Json(ForgeWebhookResponse::accepted(outcome.review_id, attrs.iid)),
    )
        .into_response()
}
