//! Queue error types.

use thiserror::Error;

/// Convenient alias for queue results.
pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Transport or command failure against the queue backend.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Job envelope could not be (de)serialized.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Configuration problems (bad host/port, empty topic).
    #[error("queue config error: {0}")]
    Config(String),
}
