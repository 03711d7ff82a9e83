//! Job notification bus via Redis Pub/Sub.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use webmux_models::JobAnnouncement;

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};

/// Stream of decoded announcements for one subscription.
pub type AnnouncementStream = Pin<Box<dyn Stream<Item = JobAnnouncement> + Send>>;

/// Best-effort publish/subscribe channel for job announcements.
///
/// Delivery is at-most-once per connected subscriber: a message published
/// while nobody is subscribed is lost. Announcements carry no authority; the
/// consumer reloads state from the `JobStore`.
#[async_trait]
pub trait NotificationBus: Send + Sync {
    /// Publish an announcement on a topic.
    async fn publish(&self, topic: &str, announcement: &JobAnnouncement) -> QueueResult<()>;

    /// Subscribe to a topic. The stream ends when the subscription drops.
    async fn subscribe(&self, topic: &str) -> QueueResult<AnnouncementStream>;
}

/// Redis Pub/Sub notification bus.
#[derive(Clone)]
pub struct RedisNotificationBus {
    client: redis::Client,
    publisher: MultiplexedConnection,
}

impl RedisNotificationBus {
    /// Connect the publishing side. Subscriptions open their own connection.
    pub async fn connect(config: &QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let publisher = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;

        info!("Connected notification bus to Redis");
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl NotificationBus for RedisNotificationBus {
    async fn publish(&self, topic: &str, announcement: &JobAnnouncement) -> QueueResult<()> {
        let mut conn = self.publisher.clone();
        let payload = serde_json::to_string(announcement)?;

        let receivers: i64 = conn
            .publish(topic, payload)
            .await
            .map_err(|e| QueueError::publish_failed(e.to_string()))?;

        debug!(
            job_id = %announcement.job_id,
            topic,
            receivers,
            "Published job announcement"
        );
        if receivers == 0 {
            warn!(
                job_id = %announcement.job_id,
                topic,
                "No subscribers connected; announcement dropped"
            );
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> QueueResult<AnnouncementStream> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| QueueError::subscribe_failed(e.to_string()))?;

        pubsub
            .subscribe(topic)
            .await
            .map_err(|e| QueueError::subscribe_failed(e.to_string()))?;

        info!(topic, "Subscribed to job announcements");

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Unreadable announcement payload: {}", e);
                    return None;
                }
            };

            match serde_json::from_str::<JobAnnouncement>(&payload) {
                Ok(announcement) => Some(announcement),
                Err(e) => {
                    warn!("Failed to parse job announcement: {}", e);
                    None
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
