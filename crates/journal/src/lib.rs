//! Sequence log and dispatcher state
//!
//! This crate provides:
//! - Log entries for applied and reverted patches (ULID-based IDs)
//! - Append-only sequence log (sled embedded DB)
//! - Retention policy & GC
//! - Persisted dispatcher state (last failed patch)

pub mod entry;
pub mod log;
pub mod retention;
pub mod state;

// Re-exports
pub use entry::{EntryKind, PatchLogEntry};
pub use log::PatchLog;
pub use retention::{GarbageCollector, GcReport, RetentionPolicy};
pub use state::DispatcherState;

/// Result type for journal operations
pub type Result<T> = anyhow::Result<T>;
