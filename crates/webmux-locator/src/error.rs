//! Locator error types.

use thiserror::Error;

pub type LocatorResult<T> = Result<T, LocatorError>;

#[derive(Debug, Error)]
pub enum LocatorError {
    /// The lookup succeeded but did not list a usable audio/video pair.
    #[error("{0}")]
    NotFound(String),

    #[error("Metadata lookup failed: {0}")]
    RequestFailed(String),

    #[error("Invalid metadata response: {0}")]
    InvalidResponse(String),

    #[error("Metadata lookup timed out after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl LocatorError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LocatorError::NotFound(_))
    }
}
