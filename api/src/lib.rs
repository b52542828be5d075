//! HTTP surface and process bootstrap.
//!
//! `start()` builds the process-wide collaborator set (database, forge
//! client, LLM client, queue), spawns the queue workers, and serves the
//! webhook routes. Handlers receive everything through `Arc<AppState>`.

pub mod core;
pub mod error_handler;
pub mod routes;
pub mod worker;

use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, routing::post};
use tracing::info;

use ai_llm_service::LlmClient;
use forge_client::ForgeClient;
use review_queue::{QueueConfig, QueueProducer};
use storage::Database;

use crate::core::{app_state::AppState, config::AppConfig};
use crate::error_handler::AppError;
use crate::routes::webhooks::{forge_webhook_route::forge_webhook_route, health_route::health_route};

/// Request body cap for the webhook surface.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Builds the router for the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhooks/forge", post(forge_webhook_route))
        .route("/webhooks/forge/health", post(health_route))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Constructs all collaborators, spawns workers, and serves HTTP.
pub async fn start() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;

    let db = Database::connect(&config.database_url).await?;
    let forge = ForgeClient::new(&config.forge_host, config.forge_access_token.clone())?;
    let llm = LlmClient::from_env()?;
    if config.webhook_secret.is_none() {
        tracing::warn!("FORGE_WEBHOOK_SECRET is not set; inbound webhooks are disabled");
    }

    let queue_config =
        QueueConfig::for_review_queue(&config.queue_host, config.queue_port, config.queue_tls);
    let queue = QueueProducer::connect(queue_config.clone()).await?;

    let port = config.port;
    let worker_count = config.worker_count;
    let state = Arc::new(AppState {
        config,
        db,
        forge,
        llm,
        queue,
        queue_config,
    });

    worker::spawn_workers(state.clone(), worker_count);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(AppError::Bind)?;
    info!(port, workers = worker_count, "webhook surface listening");
    axum::serve(listener, app).await.map_err(AppError::Server)?;
    Ok(())
}
