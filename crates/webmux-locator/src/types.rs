//! Invidious response types and stream selection.

use serde::{Deserialize, Serialize};

use crate::error::{LocatorError, LocatorResult};

/// MIME type required for the audio stream.
pub const AUDIO_MIME: &str = "audio/webm";

/// MIME type required for the video stream.
pub const VIDEO_MIME: &str = "video/webm";

/// Subset of `/api/v1/videos/{id}` used by the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub adaptive_formats: Vec<AdaptiveFormat>,
}

/// One adaptive (audio-only or video-only) stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveFormat {
    /// MIME type, optionally with parameters (`audio/webm; codecs="opus"`)
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl AdaptiveFormat {
    /// Whether the MIME essence (type/subtype, parameters stripped) matches.
    pub fn is(&self, mime: &str) -> bool {
        let essence = self.mime_type.split(';').next().unwrap_or_default().trim();
        essence.eq_ignore_ascii_case(mime)
    }
}

/// Stream pair selected for a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMedia {
    pub audio_url: String,
    pub video_url: String,
    pub title: String,
}

/// Pick the first WebM audio and first WebM video entry that carry a URL.
pub fn select_streams(details: &VideoDetails) -> LocatorResult<ResolvedMedia> {
    let find = |mime: &str| {
        details
            .adaptive_formats
            .iter()
            .filter(|f| f.is(mime))
            .find_map(|f| f.url.clone().filter(|u| !u.is_empty()))
    };

    match (find(AUDIO_MIME), find(VIDEO_MIME)) {
        (Some(audio_url), Some(video_url)) => Ok(ResolvedMedia {
            audio_url,
            video_url,
            title: details.title.clone(),
        }),
        (audio, video) => {
            let mut missing = Vec::new();
            if audio.is_none() {
                missing.push(AUDIO_MIME);
            }
            if video.is_none() {
                missing.push(VIDEO_MIME);
            }
            Err(LocatorError::not_found(format!(
                "WebM streams not found (missing {})",
                missing.join(", ")
            )))
        }
    }
}
