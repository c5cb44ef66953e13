//! Backlog scan of the watch directory

use crate::filter::PatchFilter;
use crate::WatchError;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Patch files already present in `dir`, sorted by file name
pub fn scan_backlog(dir: &Path, filter: &PatchFilter) -> Result<Vec<PathBuf>, WatchError> {
    let mut found = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;

        if !entry.file_type().is_file() {
            continue;
        }
        if filter.matches(entry.path()) {
            found.push(entry.into_path());
        } else {
            debug!(path = %entry.path().display(), "Skipping non-patch file");
        }
    }

    Ok(found)
}
