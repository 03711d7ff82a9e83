//! Stream retrieval and FFmpeg remuxing.
//!
//! This crate provides:
//! - `StreamRetriever`: streamed HTTP GET of a media URL into a local file
//! - `Muxer`: stream-copy combination of a video and an audio track
//! - Type-safe FFmpeg command building with timeout-bounded execution
//! - Filesystem helpers for scratch directories and cross-device moves

pub mod command;
pub mod download;
pub mod error;
pub mod fs_utils;
pub mod mux;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use download::{HttpStreamRetriever, StreamRetriever};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{move_file, remove_dir_best_effort};
pub use mux::{FfmpegMuxer, Muxer};
