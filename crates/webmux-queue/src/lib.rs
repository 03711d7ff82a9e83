//! Job record store and job notification bus.
//!
//! This crate provides:
//! - `JobStore`: one JSON record per job id with merge-style status updates
//! - `NotificationBus`: best-effort pub/sub announcements of new jobs
//! - Redis implementations of both, plus in-memory ones for tests and local runs

pub mod bus;
pub mod config;
pub mod error;
pub mod memory;
pub mod store;

pub use bus::{AnnouncementStream, NotificationBus, RedisNotificationBus};
pub use config::QueueConfig;
pub use error::{QueueError, QueueResult};
pub use memory::{MemoryJobStore, MemoryNotificationBus};
pub use store::{merge_status, JobStore, RedisJobStore, StatusUpdate};
