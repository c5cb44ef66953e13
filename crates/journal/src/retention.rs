//! Retention policy and garbage collection

use crate::entry::PatchLogEntry;
use crate::log::PatchLog;
use anyhow::Result;
use std::path::PathBuf;
use ulid::Ulid;

/// Retention policy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Number of newest entries to keep (default: 100)
    pub max_entries: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { max_entries: 100 }
    }
}

/// Outcome of a collection pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GcReport {
    /// Entries removed from the log
    pub removed: Vec<Ulid>,
    /// Revert artifacts that belonged to removed entries
    pub artifacts: Vec<PathBuf>,
}

/// Garbage collector
pub struct GarbageCollector {
    policy: RetentionPolicy,
}

impl GarbageCollector {
    /// Create a new GC with the given policy
    pub fn new(policy: RetentionPolicy) -> Self {
        Self { policy }
    }

    /// Decide what falls outside the policy
    ///
    /// `entries` must be oldest first. Only the oldest entries are dropped,
    /// and a revert marker is always newer than the entry it reverts, so a
    /// kept marker never loses its target and a dropped target never leaves
    /// its marker behind as the only record.
    pub fn plan(&self, entries: &[PatchLogEntry]) -> GcReport {
        let excess = entries.len().saturating_sub(self.policy.max_entries);
        let mut report = GcReport::default();

        for entry in &entries[..excess] {
            report.removed.push(entry.id);
            if let Some(artifact) = &entry.revert_patch {
                report.artifacts.push(artifact.clone());
            }
        }

        report
    }

    /// Remove entries outside the policy from `log`
    ///
    /// Artifact files are left to the caller, which knows the repository root.
    pub fn collect(&self, log: &PatchLog) -> Result<GcReport> {
        let report = self.plan(&log.entries()?);
        for id in &report.removed {
            log.delete(id)?;
        }

        tracing::info!(
            removed = report.removed.len(),
            kept = log.count(),
            "Sequence log pruned"
        );

        Ok(report)
    }
}
