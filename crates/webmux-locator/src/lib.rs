//! Media locator backed by an Invidious instance.
//!
//! Resolves a video id to one WebM audio stream URL, one WebM video stream
//! URL and the video title. The two streams share a container, which is what
//! lets the worker remux them without re-encoding.

pub mod client;
pub mod error;
pub mod types;

pub use client::{InvidiousClient, LocatorConfig, MediaLocator};
pub use error::{LocatorError, LocatorResult};
pub use types::{select_streams, AdaptiveFormat, ResolvedMedia, VideoDetails, AUDIO_MIME, VIDEO_MIME};
