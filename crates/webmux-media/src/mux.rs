//! Stream-copy remuxing of separate video and audio tracks.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Combines one video track and one audio track into a single container.
#[async_trait]
pub trait Muxer: Send + Sync {
    /// Write `output` from the first video stream of `video` and the first
    /// audio stream of `audio`, without re-encoding.
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> MediaResult<()>;
}

/// FFmpeg-backed muxer.
#[derive(Debug, Clone, Default)]
pub struct FfmpegMuxer {
    runner: FfmpegRunner,
}

impl FfmpegMuxer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(timeout),
        }
    }

    /// Use a custom runner.
    pub fn with_runner(runner: FfmpegRunner) -> Self {
        Self { runner }
    }

    /// Command used to combine the two tracks.
    pub fn command(video: &Path, audio: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(output)
            .input(video)
            .input(audio)
            .map("0:v:0")
            .map("1:a:0")
            .stream_copy()
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> MediaResult<()> {
        for input in [video, audio] {
            if !tokio::fs::try_exists(input).await.unwrap_or(false) {
                return Err(MediaError::FileNotFound(input.to_path_buf()));
            }
        }

        debug!("Muxing {} + {}", video.display(), audio.display());
        self.runner
            .run(&Self::command(video, audio, output))
            .await?;

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg reported success but wrote no output",
                None,
                None,
            ));
        }

        info!("Muxed output written to {}", output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mux_command_maps_one_stream_from_each_input() {
        let args = FfmpegMuxer::command(
            Path::new("v.webm"),
            Path::new("a.webm"),
            Path::new("out.webm"),
        )
        .build_args();

        let joined = args.join(" ");
        assert!(joined.contains("-i v.webm -i a.webm"));
        assert!(joined.contains("-map 0:v:0 -map 1:a:0"));
        assert!(joined.contains("-c:v copy -c:a copy"));
        assert_eq!(args.last().map(String::as_str), Some("out.webm"));
    }

    #[tokio::test]
    async fn test_mux_missing_input() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("video.webm");
        let audio = dir.path().join("audio.webm");
        tokio::fs::write(&video, b"v").await.unwrap();

        let err = FfmpegMuxer::new(Duration::from_secs(5))
            .mux(&video, &audio, &dir.path().join("merged.webm"))
            .await
            .unwrap_err();

        match err {
            MediaError::FileNotFound(path) => assert_eq!(path, audio),
            other => panic!("expected FileNotFound, got {:?}", other),
        }
    }
}
