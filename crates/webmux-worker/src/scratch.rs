//! Filesystem layout under the mount root and per-job scratch directories.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use webmux_media::remove_dir_best_effort;
use webmux_models::{output_file_name, JobId, VideoId, OUTPUT_DIR};

/// Scratch file receiving the audio stream.
pub const AUDIO_FILE: &str = "audio.webm";
/// Scratch file receiving the video stream.
pub const VIDEO_FILE: &str = "video.webm";
/// Scratch file FFmpeg writes before the result is moved to the outputs.
pub const MERGED_FILE: &str = "merged.webm";

/// Paths derived from the mount root.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/{jobId}`
    pub fn scratch_dir(&self, job_id: &JobId) -> PathBuf {
        self.root.join(job_id.as_str())
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// `{root}/outputs/{jobId}-{videoId}.webm`
    pub fn output_path(&self, job_id: &JobId, video_id: &VideoId) -> PathBuf {
        self.outputs_dir().join(output_file_name(job_id, video_id))
    }
}

/// Whether a job id can name its own scratch directory under the root.
///
/// Scratch directories share the root with the outputs directory, so its
/// name is reserved.
pub fn is_valid_scratch_name(id: &str) -> bool {
    !id.is_empty()
        && id != OUTPUT_DIR
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// A job's exclusively-owned scratch directory.
///
/// `cleanup` removes it asynchronously. If the guard is dropped without
/// `cleanup` (a panic or a cancelled task) the directory is removed
/// synchronously in `Drop`.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    removed: bool,
}

impl ScratchDir {
    /// Create an empty directory at `path`, discarding leftovers of an
    /// earlier attempt at the same job.
    pub async fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();

        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => debug!("Removed stale scratch directory {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        tokio::fs::create_dir_all(&path).await?;

        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the directory and everything in it. Errors are logged only.
    pub async fn cleanup(mut self) -> bool {
        self.removed = true;
        remove_dir_best_effort(&self.path).await
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove scratch directory {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let layout = StorageLayout::new("/mnt/data");
        let job_id = JobId::from_string("j1");
        let video_id = VideoId::from_trusted("abcdefghijk");

        assert_eq!(layout.scratch_dir(&job_id), PathBuf::from("/mnt/data/j1"));
        assert_eq!(
            layout.output_path(&job_id, &video_id),
            PathBuf::from("/mnt/data/outputs/j1-abcdefghijk.webm")
        );
    }

    #[test]
    fn test_valid_scratch_name() {
        assert!(is_valid_scratch_name("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_valid_scratch_name("outputs-2"));
        assert!(!is_valid_scratch_name("../etc"));
        assert!(!is_valid_scratch_name("a/b"));
        assert!(!is_valid_scratch_name(""));
        assert!(!is_valid_scratch_name(OUTPUT_DIR));
    }

    #[tokio::test]
    async fn test_create_replaces_stale_contents() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("j1");
        tokio::fs::create_dir_all(&path).await.unwrap();
        tokio::fs::write(path.join(AUDIO_FILE), b"partial").await.unwrap();

        let scratch = ScratchDir::create(&path).await.unwrap();
        assert!(scratch.path().is_dir());
        assert!(!scratch.file(AUDIO_FILE).exists());

        assert!(scratch.cleanup().await);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("j2");
        {
            let scratch = ScratchDir::create(&path).await.unwrap();
            std::fs::write(scratch.file(VIDEO_FILE), b"v").unwrap();
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_cleanup_after_external_removal() {
        let root = TempDir::new().unwrap();
        let scratch = ScratchDir::create(root.path().join("j3")).await.unwrap();
        std::fs::remove_dir_all(scratch.path()).unwrap();

        assert!(scratch.cleanup().await);
    }
}
