//! Job record store.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use webmux_models::{Job, JobId, JobPatch, JobStatus};

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};

/// Outcome of a status update.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    /// The merged record was persisted.
    Applied(Job),
    /// No record exists for the job; nothing was written.
    Missing,
    /// The record is in a state that does not permit the transition.
    Rejected(Job),
}

impl StatusUpdate {
    pub fn is_applied(&self) -> bool {
        matches!(self, StatusUpdate::Applied(_))
    }
}

/// Key-value store holding one serialized record per job.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Load a job record.
    async fn get(&self, job_id: &JobId) -> QueueResult<Option<Job>>;

    /// Write a full job record, replacing any existing one.
    async fn set(&self, job_id: &JobId, job: &Job) -> QueueResult<()>;

    /// Read-modify-write a status transition.
    ///
    /// A missing record is a silent no-op. The merged record is written with
    /// a single `set`, so either the whole update is visible or none of it.
    async fn update_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        patch: JobPatch,
    ) -> QueueResult<StatusUpdate>;

    /// Round-trip to the backend (readiness checks).
    async fn ping(&self) -> QueueResult<()> {
        Ok(())
    }
}

/// Merge a transition into a loaded record, shared by every store backend.
///
/// Returns the record to persist, or the reason nothing should be written.
pub fn merge_status(current: Option<Job>, status: JobStatus, patch: JobPatch) -> StatusUpdate {
    match current {
        None => StatusUpdate::Missing,
        Some(job) if !job.status.can_transition_to(status) => StatusUpdate::Rejected(job),
        Some(mut job) => {
            job.apply(status, patch);
            StatusUpdate::Applied(job)
        }
    }
}

/// Redis-backed job store.
///
/// Holds a single multiplexed connection opened at construction time;
/// clones of the connection share the same socket.
#[derive(Clone)]
pub struct RedisJobStore {
    conn: MultiplexedConnection,
    config: QueueConfig,
}

impl RedisJobStore {
    /// Connect to Redis.
    pub async fn connect(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;

        info!("Connected job store to Redis");
        Ok(Self { conn, config })
    }

    /// Create from environment variables.
    pub async fn from_env() -> QueueResult<Self> {
        Self::connect(QueueConfig::from_env()).await
    }

    fn key(&self, job_id: &JobId) -> String {
        self.config.job_key(job_id.as_str())
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn get(&self, job_id: &JobId) -> QueueResult<Option<Job>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.key(job_id)).await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, job_id: &JobId, job: &Job) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(job)?;
        conn.set::<_, _, ()>(self.key(job_id), payload).await?;
        debug!(job_id = %job_id, status = %job.status, "Stored job record");
        Ok(())
    }

    async fn update_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        patch: JobPatch,
    ) -> QueueResult<StatusUpdate> {
        let current = self.get(job_id).await?;
        let update = merge_status(current, status, patch);

        match &update {
            StatusUpdate::Applied(job) => self.set(job_id, job).await?,
            StatusUpdate::Missing => {
                debug!(job_id = %job_id, status = %status, "Job record missing, status update skipped");
            }
            StatusUpdate::Rejected(job) => {
                warn!(
                    job_id = %job_id,
                    current = %job.status,
                    requested = %status,
                    "Rejected status transition"
                );
            }
        }

        Ok(update)
    }

    async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webmux_models::VideoId;

    fn queued() -> Job {
        Job::with_id(
            JobId::from_string("j1"),
            VideoId::from_trusted("abcdefghijk"),
        )
    }

    #[test]
    fn test_merge_missing_is_noop() {
        let update = merge_status(None, JobStatus::Processing, JobPatch::empty());
        assert_eq!(update, StatusUpdate::Missing);
        assert!(!update.is_applied());
    }

    #[test]
    fn test_merge_applies_transition() {
        match merge_status(Some(queued()), JobStatus::Processing, JobPatch::empty()) {
            StatusUpdate::Applied(job) => {
                assert_eq!(job.status, JobStatus::Processing);
                assert!(job.updated_at.is_some());
            }
            other => panic!("expected applied, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_rejects_terminal_record() {
        let mut job = queued();
        job.apply(JobStatus::Failed, JobPatch::failed("boom"));

        match merge_status(Some(job), JobStatus::Completed, JobPatch::completed("a", "b")) {
            StatusUpdate::Rejected(job) => {
                assert_eq!(job.status, JobStatus::Failed);
                assert_eq!(job.error.as_deref(), Some("boom"));
            }
            other => panic!("expected rejected, got {:?}", other),
        }
    }
}
