//! Shared data models for webmux.
//!
//! This crate provides Serde-serializable types for:
//! - Job records and their status lifecycle
//! - Merge patches applied on status transitions
//! - Pub/sub job announcements
//! - Video id validation, filename sanitizing and output-path layout

pub mod announcement;
pub mod error;
pub mod job;
pub mod job_status;
pub mod utils;

// Re-export common types
pub use announcement::JobAnnouncement;
pub use error::{ModelError, ModelResult};
pub use job::{Job, JobId, JobPatch, VideoId};
pub use job_status::JobStatus;
pub use utils::{
    output_file_name, output_relative_path, sanitize_filename, user_filename, OUTPUT_DIR,
    OUTPUT_EXTENSION,
};
