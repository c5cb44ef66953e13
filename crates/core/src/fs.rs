//! File system port used by the patch processor
//!
//! The processor never touches a concrete file system; it goes through
//! [`FileSystemPort`]. [`LocalFs`] is the production adapter, rooted at the
//! repository root so every path handed to it is repository-relative.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Underlying I/O failure for a specific path
#[derive(Debug, Error)]
#[error("I/O error on '{path}': {source}")]
pub struct FsError {
    /// Repository-relative path the operation targeted
    pub path: String,
    /// Cause reported by the adapter
    #[source]
    pub source: io::Error,
}

impl FsError {
    pub fn new(path: impl Into<String>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Operations the processor needs from a target tree
///
/// All paths are normalized, repository-relative, `/`-separated strings.
#[async_trait]
pub trait FileSystemPort: Send + Sync {
    /// Read a file as UTF-8 text
    async fn read_file(&self, path: &str) -> Result<String, FsError>;

    /// Create or truncate a file and write `content`
    async fn write_file(&self, path: &str, content: &str) -> Result<(), FsError>;

    /// Whether anything exists at `path`
    async fn exists(&self, path: &str) -> Result<bool, FsError>;

    /// Create a directory and all missing parents; succeeds if it exists
    async fn mkdir(&self, path: &str) -> Result<(), FsError>;

    /// Unlink a file
    async fn remove_file(&self, path: &str) -> Result<(), FsError>;
}

/// Adapter over the local file system, rooted at a repository
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    /// Create an adapter rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Repository root this adapter resolves against
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl FileSystemPort for LocalFs {
    async fn read_file(&self, path: &str) -> Result<String, FsError> {
        tokio::fs::read_to_string(self.resolve(path))
            .await
            .map_err(|e| FsError::new(path, e))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), FsError> {
        tokio::fs::write(self.resolve(path), content)
            .await
            .map_err(|e| FsError::new(path, e))
    }

    async fn exists(&self, path: &str) -> Result<bool, FsError> {
        match tokio::fs::symlink_metadata(self.resolve(path)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FsError::new(path, e)),
        }
    }

    async fn mkdir(&self, path: &str) -> Result<(), FsError> {
        tokio::fs::create_dir_all(self.resolve(path))
            .await
            .map_err(|e| FsError::new(path, e))
    }

    async fn remove_file(&self, path: &str) -> Result<(), FsError> {
        tokio::fs::remove_file(self.resolve(path))
            .await
            .map_err(|e| FsError::new(path, e))
    }
}
