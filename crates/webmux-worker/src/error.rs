//! Worker error types.

use thiserror::Error;

use webmux_locator::LocatorError;
use webmux_media::MediaError;
use webmux_queue::QueueError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Fatal errors of a single job.
///
/// Every variant ends the job as `failed`; the display text becomes the
/// record's `error` field.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Scratch setup failed: {0}")]
    ScratchSetup(String),

    #[error("Media resolution failed: {0}")]
    Resolution(#[from] LocatorError),

    #[error("Failed to download {stream} stream: {source}")]
    Retrieval {
        stream: &'static str,
        #[source]
        source: MediaError,
    },

    #[error("Mux failed: {0}")]
    Mux(MediaError),

    #[error("Job store error: {0}")]
    Store(#[from] QueueError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl WorkerError {
    pub fn scratch_setup(msg: impl Into<String>) -> Self {
        Self::ScratchSetup(msg.into())
    }

    pub fn retrieval(stream: &'static str, source: MediaError) -> Self {
        Self::Retrieval { stream, source }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Stage label used in logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            WorkerError::ScratchSetup(_) => "scratch",
            WorkerError::Resolution(_) => "resolve",
            WorkerError::Retrieval { .. } => "download",
            WorkerError::Mux(_) => "mux",
            WorkerError::Store(_) => "store",
            WorkerError::ConfigError(_) => "config",
        }
    }
}
