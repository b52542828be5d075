//! Persisted row shapes and the review state machine.

use serde::{Deserialize, Serialize};

use crate::errors::StorageError;

/// Review lifecycle. Transitions are enforced by the update statements:
/// `PENDING → PROCESSING → {COMPLETED, FAILED, SKIPPED}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Skipped,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "PENDING",
            ReviewStatus::Processing => "PROCESSING",
            ReviewStatus::Completed => "COMPLETED",
            ReviewStatus::Failed => "FAILED",
            ReviewStatus::Skipped => "SKIPPED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StorageError> {
        match s {
            "PENDING" => Ok(ReviewStatus::Pending),
            "PROCESSING" => Ok(ReviewStatus::Processing),
            "COMPLETED" => Ok(ReviewStatus::Completed),
            "FAILED" => Ok(ReviewStatus::Failed),
            "SKIPPED" => Ok(ReviewStatus::Skipped),
            other => Err(StorageError::InvalidStatus(other.to_string())),
        }
    }
}

/// One project row, keyed internally by an opaque id and externally by the
/// forge's numeric project id.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Project {
    pub id: String,
    pub forge_project_id: i64,
    pub name: String,
    pub namespace: String,
    pub webhook_secret: String,
    pub is_active: bool,
}

/// One developer row. Identity for upserts is `username`; the forge user id
/// is updatable (forges recycle usernames across instances, not ids).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Developer {
    pub id: String,
    pub forge_user_id: i64,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// One review row. `status` is kept as raw TEXT here; use
/// [`Review::status`] for the typed view.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Review {
    pub id: String,
    pub merge_request_id: i64,
    pub merge_request_iid: i64,
    pub project_id: String,
    pub developer_id: String,
    pub title: String,
    pub source_url: String,
    pub source_branch: String,
    pub target_branch: String,
    #[sqlx(rename = "status")]
    pub status_raw: String,
    pub review_content: String,
    pub quality_score: Option<i64>,
    pub issues_found: i64,
    pub suggestions_count: i64,
}

impl Review {
    pub fn status(&self) -> Result<ReviewStatus, StorageError> {
        ReviewStatus::parse(&self.status_raw)
    }
}

/// Everything the webhook intake writes in one transaction.
#[derive(Debug, Clone)]
pub struct WebhookIntake {
    pub forge_project_id: i64,
    pub project_name: String,
    pub project_namespace: String,
    /// Seeded into the project row on first sight of the project.
    pub default_webhook_secret: String,

    pub forge_user_id: i64,
    pub username: String,
    pub developer_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,

    pub merge_request_id: i64,
    pub merge_request_iid: i64,
    pub title: String,
    pub description: Option<String>,
    pub source_url: String,
    pub source_branch: String,
    pub target_branch: String,
}

/// Result of the intake transaction.
#[derive(Debug, Clone)]
pub struct IntakeOutcome {
    pub review_id: String,
    /// False when the `(merge_request_id, project_id)` row already existed
    /// and the duplicate delivery was short-circuited.
    pub created: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in [
            ReviewStatus::Pending,
            ReviewStatus::Processing,
            ReviewStatus::Completed,
            ReviewStatus::Failed,
            ReviewStatus::Skipped,
        ] {
            assert_eq!(ReviewStatus::parse(s.as_str()).unwrap(), s);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(ReviewStatus::parse("RUNNING").is_err());
    }
}
