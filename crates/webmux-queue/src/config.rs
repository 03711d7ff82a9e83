//! Store and bus configuration.

/// Default pub/sub channel carrying job announcements.
pub const DEFAULT_JOB_CHANNEL: &str = "video-jobs";

/// Default prefix for job record keys.
pub const DEFAULT_JOB_KEY_PREFIX: &str = "job:";

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Pub/sub channel for job announcements
    pub job_channel: String,
    /// Prefix prepended to job ids to form record keys
    pub key_prefix: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            job_channel: DEFAULT_JOB_CHANNEL.to_string(),
            key_prefix: DEFAULT_JOB_KEY_PREFIX.to_string(),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            job_channel: std::env::var("JOB_CHANNEL")
                .unwrap_or_else(|_| DEFAULT_JOB_CHANNEL.to_string()),
            key_prefix: std::env::var("JOB_KEY_PREFIX")
                .unwrap_or_else(|_| DEFAULT_JOB_KEY_PREFIX.to_string()),
        }
    }

    /// Record key for a job id.
    pub fn job_key(&self, job_id: &str) -> String {
        format!("{}{}", self.key_prefix, job_id)
    }
}
