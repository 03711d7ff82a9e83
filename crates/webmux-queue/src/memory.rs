//! In-process store and bus.
//!
//! Same contracts as the Redis backends, used by tests and single-process runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, warn};

use webmux_models::{Job, JobAnnouncement, JobId, JobPatch, JobStatus};

use crate::bus::{AnnouncementStream, NotificationBus};
use crate::error::QueueResult;
use crate::store::{merge_status, JobStore, StatusUpdate};

/// Capacity of each topic's broadcast ring; slow subscribers lose the oldest.
const TOPIC_CAPACITY: usize = 256;

/// Job store backed by a `HashMap` of serialized records.
///
/// Records are kept as JSON so reads observe exactly what a Redis round-trip
/// would produce.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    records: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a record, simulating out-of-band deletion.
    pub async fn remove(&self, job_id: &JobId) -> bool {
        self.records.write().await.remove(job_id.as_str()).is_some()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, job_id: &JobId) -> QueueResult<Option<Job>> {
        let records = self.records.read().await;
        match records.get(job_id.as_str()) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, job_id: &JobId, job: &Job) -> QueueResult<()> {
        let payload = serde_json::to_string(job)?;
        self.records
            .write()
            .await
            .insert(job_id.as_str().to_string(), payload);
        Ok(())
    }

    async fn update_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        patch: JobPatch,
    ) -> QueueResult<StatusUpdate> {
        // Hold the write lock across the read-modify-write.
        let mut records = self.records.write().await;
        let current = match records.get(job_id.as_str()) {
            Some(json) => Some(serde_json::from_str::<Job>(json)?),
            None => None,
        };

        let update = merge_status(current, status, patch);
        if let StatusUpdate::Applied(job) = &update {
            records.insert(job_id.as_str().to_string(), serde_json::to_string(job)?);
        }
        Ok(update)
    }
}

/// Notification bus over `tokio::sync::broadcast`, one channel per topic.
#[derive(Clone, Default)]
pub struct MemoryNotificationBus {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<JobAnnouncement>>>>,
}

impl MemoryNotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on `topic`.
    pub async fn receiver_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .await
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    async fn sender(&self, topic: &str) -> broadcast::Sender<JobAnnouncement> {
        let mut topics = self.topics.lock().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl NotificationBus for MemoryNotificationBus {
    async fn publish(&self, topic: &str, announcement: &JobAnnouncement) -> QueueResult<()> {
        let sender = self.sender(topic).await;
        match sender.send(announcement.clone()) {
            Ok(receivers) => {
                debug!(job_id = %announcement.job_id, topic, receivers, "Published job announcement");
            }
            Err(_) => {
                warn!(
                    job_id = %announcement.job_id,
                    topic,
                    "No subscribers connected; announcement dropped"
                );
            }
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> QueueResult<AnnouncementStream> {
        let receiver = self.sender(topic).await.subscribe();

        let stream = futures_util::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(announcement) => return Some((announcement, receiver)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Subscriber lagged; announcements lost");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
