//! File system operations abstraction for testing
//!
//! The orchestrator only touches the disk through this trait, so the
//! working-directory lifecycle can be verified with `mockall` expectations.
//!
//! # Examples
//!
//! ```rust,no_run
//! use project_bootstrap::fs::{FileSystemOperations, StandardFileSystem};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let fs_ops: Arc<dyn FileSystemOperations> = Arc::new(StandardFileSystem);
//!
//!     fs_ops.create_dir_all(Path::new("/tmp/bootstrap-demo")).await?;
//!     if fs_ops.exists(Path::new("/tmp/bootstrap-demo")).await {
//!         fs_ops.remove_dir_all(Path::new("/tmp/bootstrap-demo")).await?;
//!     }
//!     Ok(())
//! }
//! ```

use std::io;
use std::path::Path;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

/// Trait for file system operations that can be mocked in tests
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait::async_trait]
pub trait FileSystemOperations: Send + Sync {
    /// Create a directory and all its parent directories
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Check if a path exists
    async fn exists(&self, path: &Path) -> bool;

    /// Read a whole file into memory
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Remove a directory and everything below it
    async fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// Standard implementation that uses actual file system operations
pub struct StandardFileSystem;

#[async_trait::async_trait]
impl FileSystemOperations for StandardFileSystem {
    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_dir_all(path).await
    }
}
