//! Persisted dispatcher state

use crate::entry::now_ms;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// State that must survive a dispatcher restart
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherState {
    /// Repository-relative path of the last patch that failed
    pub last_failed_patch: Option<PathBuf>,
    /// When the state last changed (Unix milliseconds)
    #[serde(default)]
    pub updated_at_ms: u64,
}

impl DispatcherState {
    /// Load from `path`; a missing file is the default state
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file {}", path.display()))
    }

    /// Write to `path` atomically (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    /// Record `patch` as the last failure
    pub fn set_failed(&mut self, patch: PathBuf) {
        self.last_failed_patch = Some(patch);
        self.updated_at_ms = now_ms();
    }

    /// Clear the failure record if it points at `patch`; returns whether it did
    pub fn clear_failed_if(&mut self, patch: &Path) -> bool {
        if self.last_failed_patch.as_deref() == Some(patch) {
            self.last_failed_patch = None;
            self.updated_at_ms = now_ms();
            true
        } else {
            false
        }
    }
}
