//! Command model for patch files

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of mutation a command block describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Write content to a path (author expects the path to be new)
    Insert,
    /// Remove a path
    Delete,
    /// Write content to a path, replacing whatever is there
    Upsert,
    /// Undo earlier patches (handled by the dispatcher, not inline)
    Revert,
}

impl CommandKind {
    /// All kinds, in marker vocabulary order
    pub const ALL: [CommandKind; 4] = [
        CommandKind::Insert,
        CommandKind::Delete,
        CommandKind::Upsert,
        CommandKind::Revert,
    ];

    /// Marker token as written in patch files
    pub fn token(self) -> &'static str {
        match self {
            CommandKind::Insert => "INSERT",
            CommandKind::Delete => "DELETE",
            CommandKind::Upsert => "UPSERT",
            CommandKind::Revert => "REVERT",
        }
    }

    /// Resolve a marker token, ignoring ASCII case
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.token().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One mutation instruction parsed from a command block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// What to do
    pub kind: CommandKind,
    /// Repository-relative target, as written in the patch
    pub target_path: String,
    /// Payload between the markers (empty for Delete)
    pub content: String,
    /// 1-based line of the start marker
    pub source_line: usize,
}

impl Command {
    /// Create a new command
    pub fn new(
        kind: CommandKind,
        target_path: impl Into<String>,
        content: impl Into<String>,
        source_line: usize,
    ) -> Self {
        Self {
            kind,
            target_path: target_path.into(),
            content: content.into(),
            source_line,
        }
    }
}

/// Record of one command that executed successfully
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Kind of the executed command
    pub kind: CommandKind,
    /// Normalized repository-relative path that was touched
    pub path: String,
    /// Content written (Insert/Upsert only)
    pub applied_content: Option<String>,
    /// Content of the target before the command ran, if it existed as text
    pub previous_content: Option<String>,
    /// The target existed but was not UTF-8 text, so nothing was captured
    #[serde(default)]
    pub previous_binary: bool,
}
