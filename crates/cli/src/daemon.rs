//! Dispatcher: ties the watcher, processor, sequence log and state together
//!
//! One dispatcher owns the repository lock for its lifetime. Patches are
//! handled one at a time: read, parse, apply through the processor, then
//! either record success (revert artifact, log entry, source removed) or
//! record the failure (source kept, remembered as last failed).

use crate::config::Config;
use crate::locks::{DispatcherLock, LockError};
use crate::util::{RepoLayout, RESERVED_DIR};
use patchd_core::{revert, LocalFs, Patch, PatchProcessor, PatchStatus};
use patchd_journal::{DispatcherState, PatchLog, PatchLogEntry};
use patchd_watcher::{PatchStream, WatchError, WatchHandle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use ulid::Ulid;

/// Dispatcher failures
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher already running (pid {pid}); stop it with 'pd stop' first")]
    AlreadyRunning { pid: u32 },

    #[error("no failed patch recorded")]
    NoFailedPatch,

    #[error("patch file no longer exists: {}", .0.display())]
    FileGone(PathBuf),

    #[error("nothing to revert")]
    NoHistory,

    #[error("revert count must be at least 1")]
    InvalidCount,

    #[error("revert artifact missing for {patch_id} (entry {entry})")]
    RevertArtifactMissing { entry: Ulid, patch_id: String },

    #[error("{} failed at line {line}: {message}", .patch.display())]
    PatchFailed {
        patch: PathBuf,
        line: usize,
        message: String,
        /// Operations applied before the failure
        applied: usize,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("sequence log error: {0:#}")]
    Log(anyhow::Error),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

impl From<LockError> for DispatchError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::AlreadyRunning { pid } => DispatchError::AlreadyRunning { pid },
            LockError::Io(source) => DispatchError::Io {
                path: PathBuf::from(RESERVED_DIR).join("watcher.pid"),
                source,
            },
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> DispatchError + '_ {
    move |source| DispatchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// The single running instance for a repository
pub struct Dispatcher {
    layout: RepoLayout,
    config: Config,
    processor: PatchProcessor,
    state: DispatcherState,
    _lock: DispatcherLock,
}

impl Dispatcher {
    /// Take the repository lock and load persisted state
    pub fn open(layout: RepoLayout, config: Config) -> Result<Self, DispatchError> {
        layout
            .ensure_dirs()
            .map_err(|e| DispatchError::Io {
                path: layout.reserved_dir(),
                source: io::Error::new(io::ErrorKind::Other, format!("{e:#}")),
            })?;

        let watch_dir = PathBuf::from(&config.watch.directory);
        let lock = DispatcherLock::acquire(&layout.lock_path(), &watch_dir)?;
        let state = DispatcherState::load(&layout.state_path()).map_err(DispatchError::Log)?;

        let processor = PatchProcessor::new(Arc::new(LocalFs::new(layout.root())))
            .with_reserved_dir(RESERVED_DIR);

        info!(root = %layout.root().display(), "Dispatcher opened");

        Ok(Self {
            layout,
            config,
            processor,
            state,
            _lock: lock,
        })
    }

    pub fn layout(&self) -> &RepoLayout {
        &self.layout
    }

    pub fn state(&self) -> &DispatcherState {
        &self.state
    }

    /// Open the watch on the configured directory, creating it if needed
    pub fn open_stream(&self) -> Result<(PatchStream, WatchHandle), DispatchError> {
        let watch = self.config.watch_config(self.layout.root());
        std::fs::create_dir_all(&watch.dir).map_err(io_err(&watch.dir))?;
        Ok(PatchStream::open(watch)?)
    }

    /// Process the backlog, then every patch the stream yields, until stopped
    ///
    /// A failing patch is logged and recorded; it never ends the loop.
    pub async fn run(&mut self, mut stream: PatchStream) -> Result<(), DispatchError> {
        let backlog = stream.backlog().to_vec();
        if !backlog.is_empty() {
            info!(count = backlog.len(), "Processing backlog");
        }
        for path in backlog {
            if stream.is_stop_requested() {
                break;
            }
            self.dispatch_logged(&path).await;
        }

        stream.listen();

        while let Some(path) = stream.next().await {
            self.dispatch_logged(&path).await;
        }

        info!("Dispatcher stopped");
        Ok(())
    }

    async fn dispatch_logged(&mut self, path: &Path) {
        match self.dispatch_file(path).await {
            Ok(_) => {}
            // Already reported with its line
            Err(DispatchError::PatchFailed { .. }) => {}
            Err(DispatchError::FileGone(p)) => debug!(path = %p.display(), "Patch gone before dispatch"),
            Err(e) => error!(path = %path.display(), "Dispatch error: {}", e),
        }
    }

    /// Apply one patch file
    ///
    /// On success the revert artifact is written, an entry is appended to the
    /// sequence log, and the file is deleted. On failure the file is kept and
    /// remembered as the last failed patch.
    pub async fn dispatch_file(&mut self, path: &Path) -> Result<PatchLogEntry, DispatchError> {
        let abs = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.layout.absolute(path)
        };
        let rel = self.layout.relative(&abs);

        let content = match tokio::fs::read_to_string(&abs).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DispatchError::FileGone(rel))
            }
            Err(e) => {
                let message = format!("cannot read patch: {e}");
                return Err(self.record_failure(&rel, 0, message, 0));
            }
        };

        debug!(patch = %rel.display(), status = %PatchStatus::Pending, "Read patch");

        let patch = match Patch::from_file(&abs, &content) {
            Ok(patch) => patch,
            Err(e) => return Err(self.record_failure(&rel, e.line(), e.to_string(), 0)),
        };

        info!(patch = %patch.id, commands = patch.commands.len(), status = %PatchStatus::Applying, "Applying patch");
        let result = self.processor.process_patch(&patch).await;

        if let Some(e) = result.error {
            return Err(self.record_failure(&rel, e.line(), e.message(), result.operations.len()));
        }

        let entry_id = Ulid::new();
        let artifact = self.write_revert_artifact(&entry_id, &patch, &result.operations).await;
        let entry = PatchLogEntry::applied(entry_id, &patch, result.operations, artifact);

        let log = self.open_log()?;
        log.append(&entry).map_err(DispatchError::Log)?;

        tokio::fs::remove_file(&abs).await.map_err(io_err(&rel))?;

        if self.state.clear_failed_if(&rel) {
            self.save_state()?;
        }

        info!(
            patch = %patch.id,
            entry = %entry.id,
            operations = entry.operations.len(),
            status = %PatchStatus::Completed,
            "Patch applied"
        );

        Ok(entry)
    }

    /// Dispatch the last failed patch again
    pub async fn retry_last_failed(&mut self) -> Result<PatchLogEntry, DispatchError> {
        let rel = self
            .state
            .last_failed_patch
            .clone()
            .ok_or(DispatchError::NoFailedPatch)?;

        let abs = self.layout.absolute(&rel);
        if !abs.exists() {
            self.state.clear_failed_if(&rel);
            self.save_state()?;
            return Err(DispatchError::FileGone(rel));
        }

        info!(patch = %rel.display(), "Retrying last failed patch");
        self.dispatch_file(&abs).await
    }

    /// Undo the last `n` applied patches, newest first
    ///
    /// Every revert artifact is loaded before anything is touched; a missing
    /// artifact aborts the whole request. A failing revert stops at that
    /// entry, keeping the reverts already done.
    pub async fn revert_last(&mut self, n: usize) -> Result<Vec<PatchLogEntry>, DispatchError> {
        if n == 0 {
            return Err(DispatchError::InvalidCount);
        }

        let log = self.open_log()?;
        let targets = log.revertible(n).map_err(DispatchError::Log)?;
        if targets.is_empty() {
            return Err(DispatchError::NoHistory);
        }

        let mut loaded = Vec::with_capacity(targets.len());
        for entry in targets {
            let missing = || DispatchError::RevertArtifactMissing {
                entry: entry.id,
                patch_id: entry.patch_id.clone(),
            };
            let artifact = entry.revert_patch.clone().ok_or_else(missing)?;
            let content = match tokio::fs::read_to_string(self.layout.absolute(&artifact)).await {
                Ok(content) => content,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(missing()),
                Err(e) => return Err(io_err(&artifact)(e)),
            };
            loaded.push((entry, artifact, content));
        }

        let mut markers = Vec::with_capacity(loaded.len());
        for (entry, artifact, content) in loaded {
            let patch = Patch::parse(format!("revert-{}", entry.patch_id), &content).map_err(|e| {
                DispatchError::PatchFailed {
                    patch: artifact.clone(),
                    line: e.line(),
                    message: e.to_string(),
                    applied: 0,
                }
            })?;

            let result = self.processor.process_patch(&patch).await;
            if let Some(e) = result.error {
                error!(patch = %entry.patch_id, line = e.line(), "Revert failed: {}", e);
                return Err(DispatchError::PatchFailed {
                    patch: artifact,
                    line: e.line(),
                    message: e.message(),
                    applied: result.operations.len(),
                });
            }

            let marker = PatchLogEntry::reverted(&entry, result.operations);
            log.append(&marker).map_err(DispatchError::Log)?;
            info!(patch = %entry.patch_id, entry = %entry.id, "Patch reverted");
            markers.push(marker);
        }

        Ok(markers)
    }

    fn record_failure(&mut self, rel: &Path, line: usize, message: String, applied: usize) -> DispatchError {
        error!(
            patch = %rel.display(),
            line,
            applied,
            status = %PatchStatus::Failed,
            "Patch failed: {}",
            message
        );

        self.state.set_failed(rel.to_path_buf());
        if let Err(e) = self.save_state() {
            warn!("Failed to persist dispatcher state: {}", e);
        }

        DispatchError::PatchFailed {
            patch: rel.to_path_buf(),
            line,
            message,
            applied,
        }
    }

    async fn write_revert_artifact(
        &self,
        entry_id: &Ulid,
        patch: &Patch,
        operations: &[patchd_core::Operation],
    ) -> Option<PathBuf> {
        let text = match revert::revert_patch(&patch.id, operations) {
            Ok(text) => text,
            Err(e) => {
                warn!(patch = %patch.id, "Patch cannot be reverted: {}", e);
                return None;
            }
        };

        let rel = self.layout.revert_artifact(entry_id);
        match tokio::fs::write(self.layout.absolute(&rel), text).await {
            Ok(()) => Some(rel),
            Err(e) => {
                warn!(patch = %patch.id, path = %rel.display(), "Failed to write revert artifact: {}", e);
                None
            }
        }
    }

    fn open_log(&self) -> Result<PatchLog, DispatchError> {
        PatchLog::open(&self.layout.sequence_dir()).map_err(DispatchError::Log)
    }

    fn save_state(&self) -> Result<(), DispatchError> {
        self.state
            .save(&self.layout.state_path())
            .map_err(DispatchError::Log)
    }
}
