//! Remux job worker.
//!
//! This crate provides:
//! - The job lifecycle controller (`JobPipeline`)
//! - A bounded executor consuming job announcements
//! - Per-job scratch directories with guaranteed cleanup
//! - Structured job logging and Prometheus metrics

pub mod config;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod scratch;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use lifecycle::{JobOutcome, JobPipeline, SkipReason};
pub use logging::JobLogger;
pub use scratch::{ScratchDir, StorageLayout};
