use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::fs::FileSystemOperations;

/// Per-build temporary directory, removed exactly once.
///
/// [`WorkingDirectory::cleanup`] is the normal exit; if the owning build is
/// dropped before reaching it, `Drop` removes the directory synchronously.
pub struct WorkingDirectory {
    path: PathBuf,
    fs: Arc<dyn FileSystemOperations>,
    released: bool,
}

impl WorkingDirectory {
    /// Create `<root>/<uuid>`
    pub async fn allocate(fs: Arc<dyn FileSystemOperations>, root: &Path) -> io::Result<Self> {
        let path = root.join(Uuid::new_v4().to_string());
        fs.create_dir_all(&path).await?;
        debug!(path = %path.display(), "Allocated working directory");
        Ok(Self {
            path,
            fs,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recursively delete the directory. A directory that is already gone counts as removed.
    pub async fn cleanup(mut self) -> io::Result<()> {
        self.released = true;
        match self.fs.remove_dir_all(&self.path).await {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for WorkingDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingDirectory")
            .field("path", &self.path)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for WorkingDirectory {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = std::fs::remove_dir_all(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Failed to remove abandoned working directory"
                );
            }
        }
    }
}
