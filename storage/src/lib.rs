//! Relational persistence for projects, developers, and reviews.
//!
//! Short transactions only: the webhook intake writes its three rows in one
//! transaction; the orchestrator touches single rows through the transition
//! helpers. Status transitions are enforced in SQL (`WHERE status = …`) so a
//! stale worker cannot resurrect a terminal review.

pub mod errors;
pub mod models;

use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};
use uuid::Uuid;

use errors::{StorageError, StorageResult};
use models::{Developer, IntakeOutcome, Project, Review, ReviewStatus, WebhookIntake};

const SCHEMA: [&str; 3] = [
    r#"
CREATE TABLE IF NOT EXISTS projects (
    id               TEXT PRIMARY KEY,
    forge_project_id INTEGER NOT NULL UNIQUE,
    name             TEXT NOT NULL,
    namespace        TEXT NOT NULL,
    webhook_secret   TEXT NOT NULL,
    is_active        INTEGER NOT NULL DEFAULT 1,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS developers (
    id            TEXT PRIMARY KEY,
    forge_user_id INTEGER NOT NULL,
    username      TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    email         TEXT,
    avatar_url    TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS reviews (
    id                TEXT PRIMARY KEY,
    merge_request_id  INTEGER NOT NULL,
    merge_request_iid INTEGER NOT NULL,
    project_id        TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    developer_id      TEXT NOT NULL REFERENCES developers(id),
    title             TEXT NOT NULL,
    description       TEXT,
    source_url        TEXT NOT NULL,
    source_branch     TEXT NOT NULL,
    target_branch     TEXT NOT NULL,
    status            TEXT NOT NULL,
    review_content    TEXT NOT NULL DEFAULT '{}',
    quality_score     INTEGER,
    issues_found      INTEGER NOT NULL DEFAULT 0,
    suggestions_count INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,
    UNIQUE (merge_request_id, project_id)
)
"#,
];

/// Pooled database handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connects to `url` (e.g. `sqlite://reviews.db`), creating the file and
    /// schema when missing. Foreign keys are enabled so project deletion
    /// cascades to reviews.
    pub async fn connect(url: &str) -> StorageResult<Self> {
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // An in-memory database exists per connection; keep the pool at one
        // so every query sees the same schema.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        info!(%url, "database ready");
        Ok(Self { pool })
    }

    /// In-memory database for tests.
    pub async fn in_memory() -> StorageResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Webhook intake: upsert project + developer, then create the PENDING
    /// review unless one already exists for `(merge_request_id, project_id)`.
    /// All writes happen in one transaction.
    pub async fn record_webhook(&self, intake: &WebhookIntake) -> StorageResult<IntakeOutcome> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        // Project upsert keyed by the forge's numeric id. The webhook secret
        // is seeded on create and never overwritten here.
        sqlx::query(
            r#"
            INSERT INTO projects (id, forge_project_id, name, namespace, webhook_secret, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 1, ?, ?)
            ON CONFLICT(forge_project_id) DO UPDATE SET
                name = excluded.name,
                namespace = excluded.namespace,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(intake.forge_project_id)
        .bind(&intake.project_name)
        .bind(&intake.project_namespace)
        .bind(&intake.default_webhook_secret)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let project_id: String =
            sqlx::query_scalar("SELECT id FROM projects WHERE forge_project_id = ?")
                .bind(intake.forge_project_id)
                .fetch_one(&mut *tx)
                .await?;

        // Developer upsert keyed by username; the forge user id is updatable.
        sqlx::query(
            r#"
            INSERT INTO developers (id, forge_user_id, username, name, email, avatar_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(username) DO UPDATE SET
                forge_user_id = excluded.forge_user_id,
                name = excluded.name,
                email = excluded.email,
                avatar_url = excluded.avatar_url,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(intake.forge_user_id)
        .bind(&intake.username)
        .bind(&intake.developer_name)
        .bind(&intake.email)
        .bind(&intake.avatar_url)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let developer_id: String =
            sqlx::query_scalar("SELECT id FROM developers WHERE username = ?")
                .bind(&intake.username)
                .fetch_one(&mut *tx)
                .await?;

        // Redelivery short-circuit: one review per (merge_request_id, project).
        let existing: Option<String> = sqlx::query_scalar(
            "SELECT id FROM reviews WHERE merge_request_id = ? AND project_id = ?",
        )
        .bind(intake.merge_request_id)
        .bind(&project_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(review_id) = existing {
            tx.commit().await?;
            debug!(%review_id, mr_id = intake.merge_request_id, "duplicate webhook delivery suppressed");
            return Ok(IntakeOutcome {
                review_id,
                created: false,
            });
        }

        let review_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO reviews (
                id, merge_request_id, merge_request_iid, project_id, developer_id,
                title, description, source_url, source_branch, target_branch,
                status, review_content, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '{}', ?, ?)
            "#,
        )
        .bind(&review_id)
        .bind(intake.merge_request_id)
        .bind(intake.merge_request_iid)
        .bind(&project_id)
        .bind(&developer_id)
        .bind(&intake.title)
        .bind(&intake.description)
        .bind(&intake.source_url)
        .bind(&intake.source_branch)
        .bind(&intake.target_branch)
        .bind(ReviewStatus::Pending.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(IntakeOutcome {
            review_id,
            created: true,
        })
    }

    /// Fetch a project row by its forge-side numeric id.
    pub async fn get_project(&self, forge_project_id: i64) -> StorageResult<Option<Project>> {
        Ok(sqlx::query_as::<_, Project>(
            "SELECT id, forge_project_id, name, namespace, webhook_secret, is_active FROM projects WHERE forge_project_id = ?",
        )
        .bind(forge_project_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Fetch a developer row by username.
    pub async fn get_developer(&self, username: &str) -> StorageResult<Option<Developer>> {
        Ok(sqlx::query_as::<_, Developer>(
            "SELECT id, forge_user_id, username, name, email, avatar_url FROM developers WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Fetch one review row.
    pub async fn get_review(&self, review_id: &str) -> StorageResult<Review> {
        sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
            .bind(review_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("review {review_id}")))
    }

    /// PENDING → PROCESSING. Re-entry from PROCESSING is allowed so that an
    /// at-least-once redelivery can re-run the pipeline; terminal states are
    /// left alone. Returns false when the row was terminal (or missing).
    pub async fn mark_processing(&self, review_id: &str) -> StorageResult<bool> {
        let res = sqlx::query(
            "UPDATE reviews SET status = ?, updated_at = ? WHERE id = ? AND status IN ('PENDING', 'PROCESSING')",
        )
        .bind(ReviewStatus::Processing.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(review_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// PROCESSING → COMPLETED with the final score, counters, and content.
    pub async fn complete_review(
        &self,
        review_id: &str,
        quality_score: i64,
        issues_found: i64,
        suggestions_count: i64,
        review_content: &serde_json::Value,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            UPDATE reviews
            SET status = ?, quality_score = ?, issues_found = ?, suggestions_count = ?,
                review_content = ?, updated_at = ?
            WHERE id = ? AND status = 'PROCESSING'
            "#,
        )
        .bind(ReviewStatus::Completed.as_str())
        .bind(quality_score)
        .bind(issues_found)
        .bind(suggestions_count)
        .bind(serde_json::to_string(review_content)?)
        .bind(Utc::now().to_rfc3339())
        .bind(review_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// PROCESSING → SKIPPED (LLM disabled, or nothing reviewable).
    pub async fn skip_review(
        &self,
        review_id: &str,
        review_content: &serde_json::Value,
    ) -> StorageResult<()> {
        sqlx::query(
            "UPDATE reviews SET status = ?, review_content = ?, updated_at = ? WHERE id = ? AND status = 'PROCESSING'",
        )
        .bind(ReviewStatus::Skipped.as_str())
        .bind(serde_json::to_string(review_content)?)
        .bind(Utc::now().to_rfc3339())
        .bind(review_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// PROCESSING → FAILED. Called by the worker once the job's retry
    /// budget is exhausted.
    pub async fn fail_review(&self, review_id: &str) -> StorageResult<()> {
        sqlx::query(
            "UPDATE reviews SET status = ?, updated_at = ? WHERE id = ? AND status = 'PROCESSING'",
        )
        .bind(ReviewStatus::Failed.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(review_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::ReviewStatus;

    fn sample_intake() -> WebhookIntake {
        WebhookIntake {
            forge_project_id: 42,
            project_name: "billing".into(),
            project_namespace: "acme".into(),
            default_webhook_secret: "s3cret".into(),
            forge_user_id: 7,
            username: "jdoe".into(),
            developer_name: "J. Doe".into(),
            email: Some("jdoe@example.com".into()),
            avatar_url: None,
            merge_request_id: 1001,
            merge_request_iid: 12,
            title: "Fix rounding".into(),
            description: None,
            source_url: "https://forge.example.com/acme/billing/-/merge_requests/12".into(),
            source_branch: "fix/rounding".into(),
            target_branch: "main".into(),
        }
    }

    #[tokio::test]
    async fn intake_creates_pending_review_once() {
        let db = Database::in_memory().await.unwrap();

        let first = db.record_webhook(&sample_intake()).await.unwrap();
        assert!(first.created);

        let second = db.record_webhook(&sample_intake()).await.unwrap();
        assert!(!second.created);
        assert_eq!(first.review_id, second.review_id);

        let row = db.get_review(&first.review_id).await.unwrap();
        assert_eq!(row.status().unwrap(), ReviewStatus::Pending);
        assert_eq!(row.merge_request_iid, 12);
    }

    #[tokio::test]
    async fn redelivery_updates_project_and_developer_fields() {
        let db = Database::in_memory().await.unwrap();
        db.record_webhook(&sample_intake()).await.unwrap();

        let mut renamed = sample_intake();
        renamed.project_name = "billing-core".into();
        renamed.forge_user_id = 99;
        db.record_webhook(&renamed).await.unwrap();

        let project = db.get_project(42).await.unwrap().unwrap();
        assert_eq!(project.name, "billing-core");
        assert_eq!(project.webhook_secret, "s3cret");
        assert!(project.is_active);

        let developer = db.get_developer("jdoe").await.unwrap().unwrap();
        assert_eq!(developer.forge_user_id, 99);
        assert_eq!(developer.email.as_deref(), Some("jdoe@example.com"));
    }

    #[tokio::test]
    async fn status_transitions_follow_the_state_machine() {
        let db = Database::in_memory().await.unwrap();
        let outcome = db.record_webhook(&sample_intake()).await.unwrap();
        let id = outcome.review_id;

        // Terminal transitions require PROCESSING; from PENDING they are no-ops.
        db.fail_review(&id).await.unwrap();
        assert_eq!(
            db.get_review(&id).await.unwrap().status().unwrap(),
            ReviewStatus::Pending
        );

        assert!(db.mark_processing(&id).await.unwrap());
        // Re-entry is allowed for redelivered jobs.
        assert!(db.mark_processing(&id).await.unwrap());

        db.complete_review(&id, 88, 2, 2, &serde_json::json!({"issues": []}))
            .await
            .unwrap();
        let row = db.get_review(&id).await.unwrap();
        assert_eq!(row.status().unwrap(), ReviewStatus::Completed);
        assert_eq!(row.quality_score, Some(88));

        // A completed review is terminal: further transitions do not apply.
        assert!(!db.mark_processing(&id).await.unwrap());
        db.fail_review(&id).await.unwrap();
        assert_eq!(
            db.get_review(&id).await.unwrap().status().unwrap(),
            ReviewStatus::Completed
        );
    }
}
