//! Process-wide collaborators, constructed once at startup and shared
//! across request handlers and queue workers by `Arc`.

use ai_llm_service::LlmClient;
use forge_client::ForgeClient;
use review_queue::{QueueConfig, QueueProducer};
use storage::Database;

use crate::core::config::AppConfig;

pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub forge: ForgeClient,
    pub llm: LlmClient,
    pub queue: QueueProducer,
    /// Kept for spawning worker connections with identical settings.
    pub queue_config: QueueConfig,
}
