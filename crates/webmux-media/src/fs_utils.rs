//! Filesystem helpers for scratch directories and output placement.

use std::path::Path;

use tokio::fs;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// EXDEV on Linux and macOS.
const CROSS_DEVICE_ERRNO: i32 = 18;

/// Move `src` to `dst`, creating the destination's parent.
///
/// Tries a rename first and falls back to copy then delete when the two paths
/// are on different filesystems. The copy lands in a sibling `.partial` file
/// that is renamed into place, so `dst` never holds a half-written file.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let (src, dst) = (src.as_ref(), dst.as_ref());

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(CROSS_DEVICE_ERRNO) => {
            debug!("Rename crosses filesystems, copying {} -> {}", src.display(), dst.display());
            copy_then_remove(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

async fn copy_then_remove(src: &Path, dst: &Path) -> MediaResult<()> {
    let staging = dst.with_extension("partial");

    if let Err(e) = fs::copy(src, &staging).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&staging, dst).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        warn!("Source left behind after copy {}: {}", src.display(), e);
    }
    Ok(())
}

/// Recursively remove a directory, logging instead of failing.
///
/// A directory that does not exist counts as removed. Returns whether the
/// path is gone afterwards.
pub async fn remove_dir_best_effort(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match fs::remove_dir_all(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Failed to remove directory {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_creates_parent() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("scratch").join("merged.webm");
        let dst = dir.path().join("outputs").join("job-abcdefghijk.webm");
        fs::create_dir_all(src.parent().unwrap()).await.unwrap();
        fs::write(&src, b"muxed").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"muxed");
    }

    #[tokio::test]
    async fn test_move_file_replaces_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("new.webm");
        let dst = dir.path().join("out.webm");
        fs::write(&src, b"new").await.unwrap();
        fs::write(&dst, b"old").await.unwrap();

        move_file(&src, &dst).await.unwrap();
        assert_eq!(fs::read(&dst).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_move_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let err = move_file(dir.path().join("nope"), dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Io(_)));
    }

    #[tokio::test]
    async fn test_remove_dir_best_effort() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("job");
        fs::create_dir_all(&scratch).await.unwrap();
        fs::write(scratch.join("audio.webm"), b"a").await.unwrap();

        assert!(remove_dir_best_effort(&scratch).await);
        assert!(!scratch.exists());

        // Already gone.
        assert!(remove_dir_best_effort(&scratch).await);
    }
}
