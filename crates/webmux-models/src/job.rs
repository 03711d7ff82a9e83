//! Job records stored per job id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::job_status::JobStatus;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External content identifier (11 characters of `[A-Za-z0-9_-]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Length of every valid video id.
    pub const LEN: usize = 11;

    /// Validate and wrap a video id supplied by a client.
    pub fn parse(id: impl Into<String>) -> ModelResult<Self> {
        let id = id.into();
        let valid_chars = id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if id.len() != Self::LEN || !valid_chars {
            return Err(ModelError::InvalidVideoId(id));
        }
        Ok(Self(id))
    }

    /// Wrap an id that was validated upstream (the worker never re-validates).
    pub fn from_trusted(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persistent record for one job.
///
/// Keys this type does not know about are kept in `extra` so that a
/// read-modify-write merge never drops fields written by other components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: JobId,

    pub video_id: VideoId,

    #[serde(default)]
    pub status: JobStatus,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Output location relative to the mount root (completed only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,

    /// Suggested download filename (completed only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Failure description (failed only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Job {
    /// Create a new queued job.
    pub fn new_queued(video_id: VideoId) -> Self {
        Self::with_id(JobId::new(), video_id)
    }

    /// Create a queued job with a caller-chosen id.
    pub fn with_id(job_id: JobId, video_id: VideoId) -> Self {
        Self {
            job_id,
            video_id,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            updated_at: None,
            output_path: None,
            filename: None,
            error: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Merge a status transition into this record.
    ///
    /// Fields absent from the patch are left as they are, except that the
    /// result field invariants are re-established: `error` only survives on
    /// `failed`, `output_path`/`filename` only on `completed`.
    pub fn apply(&mut self, status: JobStatus, patch: JobPatch) {
        self.status = status;
        self.updated_at = Some(Utc::now());

        if let Some(output_path) = patch.output_path {
            self.output_path = Some(output_path);
        }
        if let Some(filename) = patch.filename {
            self.filename = Some(filename);
        }
        if let Some(error) = patch.error {
            self.error = Some(error);
        }

        if status != JobStatus::Failed {
            self.error = None;
        }
        if status != JobStatus::Completed {
            self.output_path = None;
            self.filename = None;
        }
    }
}

/// Partial update carried by a status transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobPatch {
    pub output_path: Option<String>,
    pub filename: Option<String>,
    pub error: Option<String>,
}

impl JobPatch {
    /// Patch with no field changes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Patch for a successful merge.
    pub fn completed(output_path: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            output_path: Some(output_path.into()),
            filename: Some(filename.into()),
            error: None,
        }
    }

    /// Patch for a failed job.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}
