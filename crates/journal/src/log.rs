//! Append-only sequence log using sled

use crate::entry::{EntryKind, PatchLogEntry};
use anyhow::{Context, Result};
use parking_lot::RwLock;
use sled::Db;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use ulid::Ulid;

/// Append-only log of applied and reverted patches
pub struct PatchLog {
    /// Sled database
    db: Db,
    /// In-memory index: entry_id -> sequence_number
    index: RwLock<BTreeMap<Ulid, u64>>,
    /// Monotonic sequence counter
    seq_counter: AtomicU64,
}

impl PatchLog {
    /// Open or create the log in directory `path`
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path)
            .with_context(|| format!("Failed to open sequence log at {}", path.display()))?;

        // Rebuild the index; keys are big-endian so iteration follows sequence order
        let mut index = BTreeMap::new();
        let mut next_seq = 0u64;

        for item in db.iter() {
            let (key, value) = item?;
            let seq = decode_key(&key)?;
            let entry = PatchLogEntry::deserialize(&value)?;
            index.insert(entry.id, seq);
            next_seq = next_seq.max(seq + 1);
        }

        tracing::debug!(entries = index.len(), "Opened sequence log");

        Ok(Self {
            db,
            index: RwLock::new(index),
            seq_counter: AtomicU64::new(next_seq),
        })
    }

    /// Append an entry and flush it to disk
    pub fn append(&self, entry: &PatchLogEntry) -> Result<u64> {
        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        let value = entry.serialize()?;

        self.db.insert(seq.to_be_bytes(), value)?;
        self.index.write().insert(entry.id, seq);

        // Flush to ensure durability
        self.db.flush()?;

        Ok(seq)
    }

    /// Get an entry by ID
    pub fn get(&self, id: &Ulid) -> Result<Option<PatchLogEntry>> {
        let seq = match self.index.read().get(id) {
            Some(&seq) => seq,
            None => return Ok(None),
        };
        self.read_seq(seq)
    }

    /// The most recently appended entry
    pub fn latest(&self) -> Result<Option<PatchLogEntry>> {
        match self.db.last()? {
            Some((_, value)) => Ok(Some(PatchLogEntry::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// All entries, oldest first
    pub fn entries(&self) -> Result<Vec<PatchLogEntry>> {
        self.db
            .iter()
            .values()
            .map(|value| PatchLogEntry::deserialize(&value?))
            .collect()
    }

    /// Up to `limit` entries, newest first
    pub fn newest_first(&self, limit: usize) -> Result<Vec<PatchLogEntry>> {
        self.db
            .iter()
            .values()
            .rev()
            .take(limit)
            .map(|value| PatchLogEntry::deserialize(&value?))
            .collect()
    }

    /// Up to `n` applied entries that have not been reverted, newest first
    pub fn revertible(&self, n: usize) -> Result<Vec<PatchLogEntry>> {
        let mut reverted = HashSet::new();
        let mut out = Vec::new();

        for value in self.db.iter().values().rev() {
            if out.len() == n {
                break;
            }
            let entry = PatchLogEntry::deserialize(&value?)?;
            match entry.kind {
                EntryKind::Reverted { target } => {
                    reverted.insert(target);
                }
                EntryKind::Applied if !reverted.contains(&entry.id) => out.push(entry),
                EntryKind::Applied => {}
            }
        }

        Ok(out)
    }

    /// Delete an entry
    pub fn delete(&self, id: &Ulid) -> Result<()> {
        let seq = match self.index.write().remove(id) {
            Some(seq) => seq,
            None => return Ok(()), // Already deleted
        };

        self.db.remove(seq.to_be_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    /// Get the total number of entries
    pub fn count(&self) -> usize {
        self.index.read().len()
    }

    fn read_seq(&self, seq: u64) -> Result<Option<PatchLogEntry>> {
        match self.db.get(seq.to_be_bytes())? {
            Some(value) => Ok(Some(PatchLogEntry::deserialize(&value)?)),
            None => Ok(None),
        }
    }
}

fn decode_key(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .context("Sequence log key is not 8 bytes")?;
    Ok(u64::from_be_bytes(bytes))
}
