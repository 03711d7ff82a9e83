//! Structured job logging.
//!
//! Every line carries `job_id` and `video_id` so a job's lifecycle can be
//! followed in JSON output with a single filter.

use tracing::{error, info, warn, Span};

use webmux_models::{JobId, VideoId};

/// Per-job logger.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    video_id: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, video_id: &VideoId) -> Self {
        Self {
            job_id: job_id.to_string(),
            video_id: video_id.to_string(),
        }
    }

    pub fn log_start(&self) {
        info!(job_id = %self.job_id, video_id = %self.video_id, "Job started");
    }

    /// Log entry into a pipeline stage.
    pub fn log_stage(&self, stage: &str, message: &str) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            stage,
            "{}", message
        );
    }

    pub fn log_skip(&self, reason: &str) {
        info!(job_id = %self.job_id, video_id = %self.video_id, "Job skipped: {}", reason);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, video_id = %self.video_id, "Job warning: {}", message);
    }

    pub fn log_failure(&self, stage: &str, message: &str) {
        error!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            stage,
            "Job failed: {}", message
        );
    }

    pub fn log_completion(&self, filename: &str, elapsed_secs: f64) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            filename,
            elapsed_secs,
            "Job completed"
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Span wrapping the whole job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, video_id = %self.video_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let logger = JobLogger::new(&JobId::from_string("j1"), &VideoId::from_trusted("abcdefghijk"));
        assert_eq!(logger.job_id(), "j1");
        assert_eq!(logger.video_id, "abcdefghijk");
    }
}
