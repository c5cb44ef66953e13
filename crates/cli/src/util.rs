//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use std::path::{Path, PathBuf};
use ulid::Ulid;

/// Name of the reserved directory at the repository root
pub const RESERVED_DIR: &str = ".st-patches";

/// Locations of everything patchd keeps under a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLayout {
    root: PathBuf,
}

impl RepoLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout of the repository containing the working directory
    pub fn discover() -> Result<Self> {
        Ok(Self::new(find_repo_root()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `.st-patches/`
    pub fn reserved_dir(&self) -> PathBuf {
        self.root.join(RESERVED_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.reserved_dir().join("config.toml")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.reserved_dir().join("watcher.pid")
    }

    pub fn state_path(&self) -> PathBuf {
        self.reserved_dir().join("state.json")
    }

    pub fn sequence_dir(&self) -> PathBuf {
        self.reserved_dir().join("sequence")
    }

    pub fn reverts_dir(&self) -> PathBuf {
        self.reserved_dir().join("reverts")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.reserved_dir().join("logs")
    }

    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("dispatcher.log")
    }

    /// Repository-relative path of the revert artifact for a log entry
    pub fn revert_artifact(&self, entry: &Ulid) -> PathBuf {
        Path::new(RESERVED_DIR)
            .join("reverts")
            .join(format!("{entry}.revert.patch.txt"))
    }

    /// Absolute form of a repository-relative path
    pub fn absolute(&self, rel: &Path) -> PathBuf {
        self.root.join(rel)
    }

    /// Repository-relative form of `path`; relative paths are taken as-is
    pub fn relative(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            return path.to_path_buf();
        }
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    /// Create the reserved directory tree
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.reserved_dir(), self.reverts_dir(), self.logs_dir()] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Find repository root by walking up from cwd to `.st-patches/` or `.git/`
pub fn find_repo_root() -> Result<PathBuf> {
    let current = std::env::current_dir().context("Failed to get current directory")?;
    find_repo_root_from(&current)
}

/// Find repository root by walking up from `start`
pub fn find_repo_root_from(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if current.join(RESERVED_DIR).is_dir() || current.join(".git").is_dir() {
            return Ok(current);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => anyhow::bail!(
                "Not inside a repository (no {} or .git directory found)",
                RESERVED_DIR
            ),
        }
    }
}

/// Resolve a user-supplied path against the working directory
pub fn resolve_user_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(cwd.join(path))
}

/// First 8 characters of a ULID
pub fn short_id(id: &Ulid) -> String {
    id.to_string()[..8].to_string()
}

/// Format timestamp as relative time ("2 hours ago")
pub fn format_relative_time(ts_ms: u64) -> String {
    let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
    if ts_ms > now_ms {
        return "in the future".to_string();
    }
    let seconds = (now_ms - ts_ms) / 1000;

    if seconds < 60 {
        format!("{} seconds ago", seconds)
    } else if seconds < 3600 {
        format!("{} minutes ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hours ago", seconds / 3600)
    } else if seconds < 604800 {
        format!("{} days ago", seconds / 86400)
    } else {
        format!("{} weeks ago", seconds / 604800)
    }
}

/// Format timestamp as local absolute time ("2024-01-03 14:30:00")
pub fn format_absolute_time(ts_ms: u64) -> String {
    match Local.timestamp_millis_opt(ts_ms as i64).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "unknown".to_string(),
    }
}
