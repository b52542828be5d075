//! Durable, at-least-once job queue over Redis lists.
//!
//! Layout for a topic `T`:
//! - `T:pending`   : list of job envelopes awaiting a worker
//! - `T:processing`: list of envelopes currently leased
//! - `T:delayed`   : zset of envelopes scheduled for retry (score = ready-at ms)
//! - `T:dead`      : list of envelopes whose budget is exhausted
//! - `T:lock:<id>` : lease key with a TTL acting as the visibility timeout
//!
//! A worker moves an envelope pending→processing with `LMOVE`, takes a lease,
//! and on success removes it. On failure the envelope goes to the delayed
//! zset with exponential backoff, or to the dead list once attempts run out.
//! A periodic sweep promotes due delayed jobs and reclaims processing
//! entries whose lease expired (stalled workers), at most
//! `max_stalled_count` times per job.

pub mod errors;

use std::time::{Duration, Instant};

use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Direction};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use errors::QueueResult;

/// Topic used by the review pipeline.
pub const REVIEW_TOPIC: &str = "review-queue";

/// Job name carried in every envelope.
pub const PROCESS_REVIEW_JOB: &str = "process-review";

/// Payload of one review job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewJob {
    #[serde(rename = "reviewId")]
    pub review_id: String,
    #[serde(rename = "projectId")]
    pub project_id: u64,
    #[serde(rename = "mergeRequestIid")]
    pub merge_request_iid: u64,
}

/// Envelope stored on the wire around the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JobEnvelope {
    id: String,
    name: String,
    payload: ReviewJob,
    attempts: u32,
    stalled: u32,
    enqueued_at: String,
}

/// A leased job handed to the worker callback.
#[derive(Debug, Clone)]
pub struct Job {
    pub payload: ReviewJob,
    /// 1-based attempt number of this delivery.
    pub attempt: u32,
    /// True when a failure of this delivery dead-letters the job.
    pub final_attempt: bool,
}

/// Queue tuning. Lock duration and stalled policy are parameters, not
/// implementation details.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub url: String,
    pub topic: String,
    pub lock_duration_ms: u64,
    pub stalled_check_ms: u64,
    pub max_stalled_count: u32,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub poll_interval_ms: u64,
}

impl QueueConfig {
    /// Standard review-queue settings against the given Redis endpoint.
    pub fn for_review_queue(host: &str, port: u16, tls: bool) -> Self {
        let scheme = if tls { "rediss" } else { "redis" };
        Self {
            url: format!("{scheme}://{host}:{port}"),
            topic: REVIEW_TOPIC.to_string(),
            lock_duration_ms: 30_000,
            stalled_check_ms: 30_000,
            max_stalled_count: 1,
            max_attempts: 3,
            backoff_base_ms: 50,
            backoff_cap_ms: 2_000,
            poll_interval_ms: 500,
        }
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.topic, suffix)
    }

    fn lock_key(&self, job_id: &str) -> String {
        format!("{}:lock:{}", self.topic, job_id)
    }

    /// Retry delay for the given 1-based attempt count.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        (self.backoff_base_ms.saturating_mul(attempt as u64)).min(self.backoff_cap_ms)
    }
}

/// Producer half: enqueue jobs. Cheap to clone.
#[derive(Clone)]
pub struct QueueProducer {
    conn: ConnectionManager,
    cfg: QueueConfig,
}

impl QueueProducer {
    pub async fn connect(cfg: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(cfg.url.as_str())?;
        let conn = client.get_connection_manager().await?;
        info!(url = %cfg.url, topic = %cfg.topic, "queue producer connected");
        Ok(Self { conn, cfg })
    }

    /// Pushes one job onto the pending list. Returns the job id.
    pub async fn enqueue(&self, payload: &ReviewJob) -> QueueResult<String> {
        let envelope = JobEnvelope {
            id: Uuid::new_v4().to_string(),
            name: PROCESS_REVIEW_JOB.to_string(),
            payload: payload.clone(),
            attempts: 0,
            stalled: 0,
            enqueued_at: Utc::now().to_rfc3339(),
        };
        let raw = serde_json::to_string(&envelope)?;
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(self.cfg.key("pending"), raw).await?;
        debug!(job_id = %envelope.id, review_id = %payload.review_id, "job enqueued");
        Ok(envelope.id)
    }
}

/// Consumer half: a worker loop with leases, retries, and stalled reclaim.
pub struct QueueWorker {
    conn: ConnectionManager,
    cfg: QueueConfig,
}

impl QueueWorker {
    pub async fn connect(cfg: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(cfg.url.as_str())?;
        let conn = client.get_connection_manager().await?;
        info!(url = %cfg.url, topic = %cfg.topic, "queue worker connected");
        Ok(Self { conn, cfg })
    }

    /// Runs the consumption loop forever, invoking `handler` per delivery.
    ///
    /// A handler error requeues the job with backoff until the attempt
    /// budget is exhausted, then dead-letters it. The handler sees
    /// `final_attempt` and is responsible for terminal side effects
    /// (marking the review FAILED).
    pub async fn run<H, Fut, E>(&self, handler: H) -> QueueResult<()>
    where
        H: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display,
    {
        let mut last_sweep = Instant::now();
        loop {
            if last_sweep.elapsed() >= Duration::from_millis(self.cfg.stalled_check_ms) {
                if let Err(e) = self.sweep().await {
                    warn!(error = %e, "queue sweep failed");
                }
                last_sweep = Instant::now();
            }

            match self.pop_one().await {
                Ok(Some((raw, envelope))) => {
                    self.deliver(&raw, envelope, &handler).await;
                }
                Ok(None) => {
                    tokio::time::sleep(Duration::from_millis(self.cfg.poll_interval_ms)).await;
                }
                Err(e) => {
                    warn!(error = %e, "queue pop failed; backing off");
                    tokio::time::sleep(Duration::from_millis(self.cfg.poll_interval_ms)).await;
                }
            }
        }
    }

    async fn pop_one(&self) -> QueueResult<Option<(String, JobEnvelope)>> {
        let mut conn = self.conn.clone();
        self.promote_due(&mut conn).await?;

        let raw: Option<String> = conn
            .lmove(
                self.cfg.key("pending"),
                self.cfg.key("processing"),
                Direction::Right,
                Direction::Left,
            )
            .await?;
        let Some(raw) = raw else { return Ok(None) };

        match serde_json::from_str::<JobEnvelope>(&raw) {
            Ok(envelope) => {
                // Take the lease; its TTL is the visibility timeout.
                let _: () = redis::cmd("SET")
                    .arg(self.cfg.lock_key(&envelope.id))
                    .arg(1)
                    .arg("PX")
                    .arg(self.cfg.lock_duration_ms)
                    .query_async(&mut conn)
                    .await?;
                Ok(Some((raw, envelope)))
            }
            Err(e) => {
                // Poison entry: drop it from processing, keep it in dead.
                error!(error = %e, "unparseable job envelope; dead-lettering");
                let _: () = conn.lrem(self.cfg.key("processing"), 1, &raw).await?;
                let _: () = conn.lpush(self.cfg.key("dead"), &raw).await?;
                Ok(None)
            }
        }
    }

    async fn deliver<H, Fut, E>(&self, raw: &str, mut envelope: JobEnvelope, handler: &H)
    where
        H: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display,
    {
        let attempt = envelope.attempts + 1;
        let job = Job {
            payload: envelope.payload.clone(),
            attempt,
            final_attempt: attempt >= self.cfg.max_attempts,
        };
        debug!(job_id = %envelope.id, attempt, "delivering job");

        // Renew the lease at half its TTL while the handler runs, so a
        // long job is not reclaimed as stalled mid-flight.
        let renewal = {
            let mut conn = self.conn.clone();
            let lock_key = self.cfg.lock_key(&envelope.id);
            let ttl = self.cfg.lock_duration_ms;
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(ttl / 2)).await;
                    let renewed: Result<(), redis::RedisError> = redis::cmd("SET")
                        .arg(&lock_key)
                        .arg(1)
                        .arg("PX")
                        .arg(ttl)
                        .query_async(&mut conn)
                        .await;
                    if renewed.is_err() {
                        break;
                    }
                }
            })
        };

        let result = handler(job).await;
        renewal.abort();
        let mut conn = self.conn.clone();

        // Release the lease and the processing slot regardless of outcome.
        if let Err(e) = self.release(&mut conn, raw, &envelope.id).await {
            warn!(error = %e, job_id = %envelope.id, "failed to release job lease");
        }

        match result {
            Ok(()) => {
                debug!(job_id = %envelope.id, attempt, "job completed");
            }
            Err(e) => {
                envelope.attempts = attempt;
                if attempt >= self.cfg.max_attempts {
                    error!(job_id = %envelope.id, attempt, error = %e, "job exhausted retries; dead-lettering");
                    if let Err(e) = self.push_dead(&mut conn, &envelope).await {
                        error!(error = %e, job_id = %envelope.id, "dead-letter push failed");
                    }
                } else {
                    let delay = self.cfg.backoff_ms(attempt);
                    warn!(job_id = %envelope.id, attempt, delay_ms = delay, error = %e, "job failed; scheduling retry");
                    if let Err(e) = self.push_delayed(&mut conn, &envelope, delay).await {
                        error!(error = %e, job_id = %envelope.id, "retry scheduling failed");
                    }
                }
            }
        }
    }

    async fn release(
        &self,
        conn: &mut ConnectionManager,
        raw: &str,
        job_id: &str,
    ) -> QueueResult<()> {
        let _: () = conn.lrem(self.cfg.key("processing"), 1, raw).await?;
        let _: () = conn.del(self.cfg.lock_key(job_id)).await?;
        Ok(())
    }

    async fn push_delayed(
        &self,
        conn: &mut ConnectionManager,
        envelope: &JobEnvelope,
        delay_ms: u64,
    ) -> QueueResult<()> {
        let ready_at = Utc::now().timestamp_millis() as u64 + delay_ms;
        let raw = serde_json::to_string(envelope)?;
        let _: () = conn.zadd(self.cfg.key("delayed"), raw, ready_at).await?;
        Ok(())
    }

    async fn push_dead(
        &self,
        conn: &mut ConnectionManager,
        envelope: &JobEnvelope,
    ) -> QueueResult<()> {
        let raw = serde_json::to_string(envelope)?;
        let _: () = conn.lpush(self.cfg.key("dead"), raw).await?;
        Ok(())
    }

    /// Moves due delayed jobs back to pending.
    async fn promote_due(&self, conn: &mut ConnectionManager) -> QueueResult<()> {
        let now = Utc::now().timestamp_millis() as u64;
        let due: Vec<String> = conn
            .zrangebyscore(self.cfg.key("delayed"), 0u64, now)
            .await?;
        for raw in due {
            let _: () = conn.zrem(self.cfg.key("delayed"), &raw).await?;
            let _: () = conn.lpush(self.cfg.key("pending"), &raw).await?;
        }
        Ok(())
    }

    /// Reclaims processing entries whose lease expired.
    ///
    /// Each job survives at most `max_stalled_count` reclaims; beyond that it
    /// is dead-lettered so a crash-looping payload cannot circulate forever.
    async fn sweep(&self) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let entries: Vec<String> = conn.lrange(self.cfg.key("processing"), 0, -1).await?;

        for raw in entries {
            let Ok(mut envelope) = serde_json::from_str::<JobEnvelope>(&raw) else {
                let _: () = conn.lrem(self.cfg.key("processing"), 1, &raw).await?;
                let _: () = conn.lpush(self.cfg.key("dead"), &raw).await?;
                continue;
            };
            let leased: bool = conn.exists(self.cfg.lock_key(&envelope.id)).await?;
            if leased {
                continue;
            }

            let _: () = conn.lrem(self.cfg.key("processing"), 1, &raw).await?;
            envelope.stalled += 1;
            if envelope.stalled > self.cfg.max_stalled_count {
                warn!(job_id = %envelope.id, "job stalled too often; dead-lettering");
                self.push_dead(&mut conn, &envelope).await?;
            } else {
                info!(job_id = %envelope.id, stalled = envelope.stalled, "reclaiming stalled job");
                let reissued = serde_json::to_string(&envelope)?;
                let _: () = conn.lpush(self.cfg.key("pending"), reissued).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> QueueConfig {
        QueueConfig::for_review_queue("localhost", 6379, false)
    }

    #[test]
    fn backoff_is_linear_in_attempt_and_capped() {
        let cfg = cfg();
        assert_eq!(cfg.backoff_ms(1), 50);
        assert_eq!(cfg.backoff_ms(2), 100);
        assert_eq!(cfg.backoff_ms(3), 150);
        // A pathological attempt count saturates at the cap.
        assert_eq!(cfg.backoff_ms(1000), 2_000);
    }

    #[test]
    fn review_queue_defaults_match_the_wire_protocol() {
        let cfg = cfg();
        assert_eq!(cfg.topic, "review-queue");
        assert_eq!(cfg.lock_duration_ms, 30_000);
        assert_eq!(cfg.stalled_check_ms, 30_000);
        assert_eq!(cfg.max_stalled_count, 1);
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.url, "redis://localhost:6379");
    }

    #[test]
    fn tls_flag_switches_the_scheme() {
        let cfg = QueueConfig::for_review_queue("q.internal", 6380, true);
        assert_eq!(cfg.url, "rediss://q.internal:6380");
    }

    #[test]
    fn payload_serializes_with_camel_case_keys() {
        let job = ReviewJob {
            review_id: "r-1".into(),
            project_id: 42,
            merge_request_iid: 7,
        };
        let raw = serde_json::to_string(&job).unwrap();
        assert!(raw.contains("\"reviewId\":\"r-1\""));
        assert!(raw.contains("\"projectId\":42"));
        assert!(raw.contains("\"mergeRequestIid\":7"));
        let back: ReviewJob = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn key_naming_is_topic_scoped() {
        let cfg = cfg();
        assert_eq!(cfg.key("pending"), "review-queue:pending");
        assert_eq!(cfg.lock_key("abc"), "review-queue:lock:abc");
    }
}
