//! Patch directory watching for patchd
//!
//! This crate provides:
//! - Patch file name matching (glob patterns, editor temp files excluded)
//! - Backlog scan of files present at startup
//! - Per-path settle delay (debouncing)
//! - A pull-based [`PatchStream`] the dispatcher awaits

pub mod debounce;
pub mod filter;
pub mod scan;
pub mod stream;

pub use filter::{PatchFilter, DEFAULT_PATTERNS};
pub use stream::{PatchStream, WatchConfig, WatchHandle, WatchPhase};

use thiserror::Error;

/// Errors raised while setting up or running a watch
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid patch pattern: {0}")]
    Filter(#[from] ignore::Error),
}
