//! Storage error types.

use thiserror::Error;

/// Convenient alias for storage results.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Driver-level failure (connection, constraint, syntax).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON (de)serialization of document columns.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A row that must exist was not found.
    #[error("row not found: {0}")]
    NotFound(String),

    /// A status value in the database is outside the known enum.
    #[error("invalid review status: {0}")]
    InvalidStatus(String),
}
