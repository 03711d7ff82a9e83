//! Application state.

use std::sync::Arc;

use webmux_queue::{
    JobStore, NotificationBus, QueueConfig, QueueResult, RedisJobStore, RedisNotificationBus,
};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn JobStore>,
    pub bus: Arc<dyn NotificationBus>,
    /// Channel job announcements are published on
    pub job_channel: String,
}

impl AppState {
    /// Connect to Redis using environment configuration.
    pub async fn new(config: ApiConfig) -> QueueResult<Self> {
        let queue_config = QueueConfig::from_env();
        let store = RedisJobStore::connect(queue_config.clone()).await?;
        let bus = RedisNotificationBus::connect(&queue_config).await?;

        Ok(Self::with_backends(
            config,
            Arc::new(store),
            Arc::new(bus),
            queue_config.job_channel,
        ))
    }

    /// Build state over explicit backends.
    pub fn with_backends(
        config: ApiConfig,
        store: Arc<dyn JobStore>,
        bus: Arc<dyn NotificationBus>,
        job_channel: impl Into<String>,
    ) -> Self {
        Self {
            config,
            store,
            bus,
            job_channel: job_channel.into(),
        }
    }
}
