//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default mount root for scratch directories and outputs.
pub const DEFAULT_MOUNT_PATH: &str = "./tmp";

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root holding per-job scratch directories and the outputs directory
    pub mount_path: PathBuf,
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Timeout for each stream download
    pub download_timeout: Duration,
    /// Timeout for the FFmpeg remux
    pub mux_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Upper bound on the delay between re-subscription attempts
    pub resubscribe_max_backoff: Duration,
    /// Serve Prometheus metrics
    pub metrics_enabled: bool,
    /// Port of the Prometheus scrape endpoint
    pub metrics_port: u16,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            mount_path: PathBuf::from(DEFAULT_MOUNT_PATH),
            max_concurrent_jobs: 4,
            download_timeout: Duration::from_secs(1800),
            mux_timeout: Duration::from_secs(600),
            shutdown_timeout: Duration::from_secs(30),
            resubscribe_max_backoff: Duration::from_secs(30),
            metrics_enabled: false,
            metrics_port: 9091,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            mount_path: std::env::var("DISK_MOUNT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.mount_path),
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            download_timeout: secs_from_env("DOWNLOAD_TIMEOUT_SECS", defaults.download_timeout),
            mux_timeout: secs_from_env("MUX_TIMEOUT_SECS", defaults.mux_timeout),
            shutdown_timeout: secs_from_env(
                "WORKER_SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout,
            ),
            resubscribe_max_backoff: secs_from_env(
                "WORKER_RESUBSCRIBE_MAX_BACKOFF_SECS",
                defaults.resubscribe_max_backoff,
            ),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
            metrics_port: std::env::var("METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.metrics_port),
        }
    }
}

fn secs_from_env(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.mount_path, PathBuf::from("./tmp"));
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.mux_timeout, Duration::from_secs(600));
        assert!(!config.metrics_enabled);
    }
}
