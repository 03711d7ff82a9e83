//! Lightweight "new job" announcements carried over pub/sub.

use serde::{Deserialize, Serialize};

use crate::job::{Job, JobId, VideoId};

/// Announcement that a job exists.
///
/// Not authoritative: the worker reloads the record from the store. Extra
/// keys in the payload, such as a whole queued record, are ignored on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAnnouncement {
    pub job_id: JobId,
    pub video_id: VideoId,
}

impl JobAnnouncement {
    pub fn new(job_id: JobId, video_id: VideoId) -> Self {
        Self { job_id, video_id }
    }
}

impl From<&Job> for JobAnnouncement {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            video_id: job.video_id.clone(),
        }
    }
}
