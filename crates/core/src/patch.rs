//! Parsed patch files

use crate::command::Command;
use crate::parser::{self, ParseError};
use std::fmt;
use std::path::Path;
use ulid::Ulid;

/// File name suffixes stripped when deriving a patch id
pub const PATCH_SUFFIXES: [&str; 3] = [".patch.txt", ".patch.md", ".patch"];

/// Lifecycle of a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStatus {
    /// Read from disk, not started
    Pending,
    /// Commands are being executed
    Applying,
    /// Every command succeeded; source file removed
    Completed,
    /// A command failed; source file kept
    Failed,
}

impl fmt::Display for PatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatchStatus::Pending => "pending",
            PatchStatus::Applying => "applying",
            PatchStatus::Completed => "completed",
            PatchStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A parsed unit of work; immutable once parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Identifier derived from the file name, or a generated ULID
    pub id: String,
    /// Message from the reserved `commit:` line
    pub commit_message: Option<String>,
    /// Commands in file order
    pub commands: Vec<Command>,
    /// BLAKE3 hex digest of the raw text
    pub digest: String,
}

impl Patch {
    /// Parse patch text under the given id
    pub fn parse(id: impl Into<String>, content: &str) -> Result<Self, ParseError> {
        let doc = parser::parse_document(content)?;
        Ok(Self {
            id: id.into(),
            commit_message: doc.commit_message,
            commands: doc.commands,
            digest: digest(content),
        })
    }

    /// Parse patch text read from `path`, deriving the id from its file name
    pub fn from_file(path: &Path, content: &str) -> Result<Self, ParseError> {
        let id = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(patch_id_from_file_name)
            .unwrap_or_else(generated_id);
        Self::parse(id, content)
    }
}

/// Patch id for a file name: the name without its patch suffix
pub fn patch_id_from_file_name(name: &str) -> String {
    let stem = PATCH_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .unwrap_or(name);
    if stem.is_empty() {
        generated_id()
    } else {
        stem.to_string()
    }
}

/// Fresh time-ordered id
pub fn generated_id() -> String {
    Ulid::new().to_string()
}

/// BLAKE3 hex digest of patch text
pub fn digest(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}
