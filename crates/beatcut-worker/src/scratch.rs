//! Per-job scratch directory.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// A directory owned by exactly one job.
///
/// Call [`ScratchDir::remove`] on every exit path. Dropping an unremoved
/// guard (a panic mid-job) falls back to a blocking removal.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    removed: bool,
}

impl ScratchDir {
    /// Create the directory and any missing parents.
    pub async fn create(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        tokio::fs::create_dir_all(&path).await?;
        debug!(path = %path.display(), "Created scratch directory");
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the directory tree. Failure is logged, never returned.
    pub async fn remove(mut self) -> bool {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Removed scratch directory");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to remove scratch directory: {}", e);
                false
            }
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.removed {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), "Failed to remove scratch directory: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_remove() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path().join("a/job-1")).await.unwrap();
        let path = scratch.path().to_path_buf();
        tokio::fs::write(scratch.join("file.bin"), b"x").await.unwrap();
        assert!(path.is_dir());

        assert!(scratch.remove().await);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_remove_tolerates_missing_dir() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path().join("job-2")).await.unwrap();
        std::fs::remove_dir_all(scratch.path()).unwrap();
        assert!(scratch.remove().await);
    }

    #[tokio::test]
    async fn test_drop_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchDir::create(root.path().join("job-3")).await.unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
