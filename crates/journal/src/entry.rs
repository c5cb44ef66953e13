//! Sequence log entries

use anyhow::{Context, Result};
use patchd_core::{Operation, Patch};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use ulid::Ulid;

/// What an entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// A patch applied from a patch file
    Applied,
    /// An earlier applied entry was undone
    Reverted { target: Ulid },
}

/// One record in the sequence log
///
/// Entries are never rewritten once appended; undoing a patch appends a
/// [`EntryKind::Reverted`] entry pointing back at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchLogEntry {
    /// Unique ID (ULID for timestamp + uniqueness)
    pub id: Ulid,
    /// Id of the patch that produced the entry
    pub patch_id: String,
    /// Timestamp (Unix milliseconds)
    pub ts_unix_ms: u64,
    pub commit_message: Option<String>,
    /// BLAKE3 digest of the patch text
    pub digest: String,
    /// Operations in execution order
    pub operations: Vec<Operation>,
    /// Repository-relative path of the revert artifact, if one was written
    pub revert_patch: Option<PathBuf>,
    pub kind: EntryKind,
}

impl PatchLogEntry {
    /// Entry for a successfully applied patch
    pub fn applied(
        id: Ulid,
        patch: &Patch,
        operations: Vec<Operation>,
        revert_patch: Option<PathBuf>,
    ) -> Self {
        Self {
            id,
            patch_id: patch.id.clone(),
            ts_unix_ms: now_ms(),
            commit_message: patch.commit_message.clone(),
            digest: patch.digest.clone(),
            operations,
            revert_patch,
            kind: EntryKind::Applied,
        }
    }

    /// Marker recording that `target` was undone by `operations`
    pub fn reverted(target: &PatchLogEntry, operations: Vec<Operation>) -> Self {
        Self {
            id: Ulid::new(),
            patch_id: target.patch_id.clone(),
            ts_unix_ms: now_ms(),
            commit_message: Some(format!("revert {}", target.patch_id)),
            digest: target.digest.clone(),
            operations,
            revert_patch: None,
            kind: EntryKind::Reverted { target: target.id },
        }
    }

    pub fn is_applied(&self) -> bool {
        self.kind == EntryKind::Applied
    }

    /// Serialize for storage
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context("Failed to serialize log entry")
    }

    /// Deserialize from storage
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).context("Failed to deserialize log entry")
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
