//! In-memory file system that records every call

use crate::fs::{FileSystemPort, FsError};
use crate::path::parent_dir;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::io;

/// One call made against [`MemoryFs`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsCall {
    ReadFile(String),
    WriteFile(String, String),
    Exists(String),
    Mkdir(String),
    RemoveFile(String),
}

impl FsCall {
    /// Whether the call changes the tree
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            FsCall::WriteFile(..) | FsCall::Mkdir(_) | FsCall::RemoveFile(_)
        )
    }
}

#[derive(Default)]
struct Inner {
    files: BTreeMap<String, String>,
    dirs: BTreeSet<String>,
    failing: BTreeSet<String>,
    calls: Vec<FsCall>,
}

/// Recording fake for [`FileSystemPort`]
///
/// Writes fail with `NotFound` when the parent directory was never created,
/// like a real tree, so tests notice a missing `mkdir`.
#[derive(Default)]
pub struct MemoryFs {
    inner: Mutex<Inner>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file (and its parent directories) without recording a call
    pub fn with_file(self, path: &str, content: &str) -> Self {
        {
            let mut inner = self.inner.lock();
            let mut dir = parent_dir(path);
            while let Some(d) = dir {
                inner.dirs.insert(d.to_string());
                dir = parent_dir(d);
            }
            inner.files.insert(path.to_string(), content.to_string());
        }
        self
    }

    /// Make every call that touches `path` fail
    pub fn fail_on(self, path: &str) -> Self {
        self.inner.lock().failing.insert(path.to_string());
        self
    }

    /// Current content of a file
    pub fn file(&self, path: &str) -> Option<String> {
        self.inner.lock().files.get(path).cloned()
    }

    /// All recorded calls, in order
    pub fn calls(&self) -> Vec<FsCall> {
        self.inner.lock().calls.clone()
    }

    /// Recorded calls that changed the tree
    pub fn mutations(&self) -> Vec<FsCall> {
        self.calls().into_iter().filter(FsCall::is_mutation).collect()
    }

    fn record(&self, call: FsCall, path: &str) -> Result<parking_lot::MutexGuard<'_, Inner>, FsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(call);
        if inner.failing.contains(path) {
            return Err(FsError::new(
                path,
                io::Error::new(io::ErrorKind::PermissionDenied, "injected failure"),
            ));
        }
        Ok(inner)
    }
}

#[async_trait]
impl FileSystemPort for MemoryFs {
    async fn read_file(&self, path: &str) -> Result<String, FsError> {
        let inner = self.record(FsCall::ReadFile(path.to_string()), path)?;
        inner.files.get(path).cloned().ok_or_else(|| {
            FsError::new(path, io::Error::new(io::ErrorKind::NotFound, "no such file"))
        })
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), FsError> {
        let mut inner =
            self.record(FsCall::WriteFile(path.to_string(), content.to_string()), path)?;
        if let Some(parent) = parent_dir(path) {
            if !inner.dirs.contains(parent) {
                return Err(FsError::new(
                    path,
                    io::Error::new(io::ErrorKind::NotFound, "parent directory missing"),
                ));
            }
        }
        inner.files.insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, FsError> {
        let inner = self.record(FsCall::Exists(path.to_string()), path)?;
        Ok(inner.files.contains_key(path) || inner.dirs.contains(path))
    }

    async fn mkdir(&self, path: &str) -> Result<(), FsError> {
        let mut inner = self.record(FsCall::Mkdir(path.to_string()), path)?;
        let mut dir = Some(path);
        while let Some(d) = dir {
            inner.dirs.insert(d.to_string());
            dir = parent_dir(d);
        }
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<(), FsError> {
        let mut inner = self.record(FsCall::RemoveFile(path.to_string()), path)?;
        inner.files.remove(path).map(|_| ()).ok_or_else(|| {
            FsError::new(path, io::Error::new(io::ErrorKind::NotFound, "no such file"))
        })
    }
}
