//! Patch file name matching
//!
//! A file qualifies when its name matches one of the configured glob
//! patterns and it is not an editor temporary or lock file. Only the file
//! name is considered; the watch is not recursive.

use crate::WatchError;
use ignore::overrides::{Override, OverrideBuilder};
use std::path::Path;

/// Default patch file patterns
pub const DEFAULT_PATTERNS: [&str; 3] = ["*.patch.txt", "*.patch.md", "*.patch"];

/// Decides which file names in the watch directory are patches
#[derive(Debug, Clone)]
pub struct PatchFilter {
    overrides: Override,
}

impl PatchFilter {
    /// Build a filter from glob patterns
    pub fn new<S: AsRef<str>>(root: &Path, patterns: &[S]) -> Result<Self, WatchError> {
        let mut builder = OverrideBuilder::new(root);
        for pattern in patterns {
            builder.add(pattern.as_ref())?;
        }
        Ok(Self {
            overrides: builder.build()?,
        })
    }

    /// Filter with [`DEFAULT_PATTERNS`]
    pub fn with_defaults(root: &Path) -> Result<Self, WatchError> {
        Self::new(root, &DEFAULT_PATTERNS)
    }

    /// Whether `path` names a patch file
    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if is_editor_temp(name) {
            return false;
        }
        self.overrides.matched(Path::new(name), false).is_whitelist()
    }
}

/// Editor swap, backup, lock, and hidden files
fn is_editor_temp(name: &str) -> bool {
    // Dotfiles, including Emacs lock files (.#*) and macOS resource forks
    if name.starts_with('.') {
        return true;
    }

    // Vim swap files
    if [".swp", ".swo", ".swn", ".swx"]
        .iter()
        .any(|ext| name.ends_with(ext))
    {
        return true;
    }

    // Vim/Emacs backup files (~) and Emacs auto-save files (#*#)
    if name.ends_with('~') || (name.starts_with('#') && name.ends_with('#')) {
        return true;
    }

    // Atomic-save temp files written next to the target
    name.ends_with(".tmp") || name.contains(".tmp.")
}
