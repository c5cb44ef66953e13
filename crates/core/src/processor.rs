//! Patch processor: validate, then apply commands in order
//!
//! Parse errors and unsafe target paths are detected before anything is
//! written, so they always leave the tree untouched. An I/O failure while
//! executing halts the remaining commands; operations already applied are
//! reported, not rolled back.

use crate::command::{Command, CommandKind, Operation};
use crate::fs::{FileSystemPort, FsError};
use crate::parser::{self, ParseError};
use crate::patch::Patch;
use crate::path::{self, PathSafetyError};
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a patch did not complete
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unsafe target at line {line}: {source}")]
    PathSafety {
        line: usize,
        source: PathSafetyError,
    },

    #[error("command at line {line} failed: {source}")]
    Io { line: usize, source: FsError },

    #[error("{kind} at line {line} is not supported inline; use `pd revert`")]
    NotImplemented { line: usize, kind: CommandKind },
}

impl ProcessError {
    /// Patch line the failure refers to
    pub fn line(&self) -> usize {
        match self {
            ProcessError::Parse(e) => e.line(),
            ProcessError::PathSafety { line, .. }
            | ProcessError::Io { line, .. }
            | ProcessError::NotImplemented { line, .. } => *line,
        }
    }

    /// Human-readable message
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// True when the failure happened before any mutation
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            ProcessError::Parse(_) | ProcessError::PathSafety { .. }
        )
    }
}

/// Outcome of processing one patch
#[derive(Debug)]
pub struct ProcessResult {
    /// Operations applied, in order, up to the failure if any
    pub operations: Vec<Operation>,
    /// Set when the patch did not complete
    pub error: Option<ProcessError>,
}

impl ProcessResult {
    fn succeeded(operations: Vec<Operation>) -> Self {
        Self {
            operations,
            error: None,
        }
    }

    fn failed(operations: Vec<Operation>, error: ProcessError) -> Self {
        Self {
            operations,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A command whose target passed the safety checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCommand<'a> {
    pub command: &'a Command,
    /// Normalized repository-relative target
    pub path: String,
}

/// Applies patches through a [`FileSystemPort`]
pub struct PatchProcessor {
    fs: Arc<dyn FileSystemPort>,
    reserved_dir: Option<String>,
}

impl PatchProcessor {
    /// Create a processor over the given port
    pub fn new(fs: Arc<dyn FileSystemPort>) -> Self {
        Self {
            fs,
            reserved_dir: None,
        }
    }

    /// Refuse targets under this top-level directory (e.g. the state directory)
    pub fn with_reserved_dir(mut self, dir: impl Into<String>) -> Self {
        self.reserved_dir = Some(dir.into());
        self
    }

    /// Parse and apply raw patch text
    pub async fn process_content(&self, content: &str) -> ProcessResult {
        match parser::parse(content) {
            Ok(commands) => self.apply(&commands).await,
            Err(e) => {
                warn!(line = e.line(), "Patch rejected: {}", e);
                ProcessResult::failed(Vec::new(), e.into())
            }
        }
    }

    /// Apply an already parsed patch
    pub async fn process_patch(&self, patch: &Patch) -> ProcessResult {
        self.apply(&patch.commands).await
    }

    /// Check every target before anything is written
    pub fn plan<'a>(&self, commands: &'a [Command]) -> Result<Vec<PlannedCommand<'a>>, ProcessError> {
        commands
            .iter()
            .map(|command| {
                path::check_target(&command.target_path, self.reserved_dir.as_deref())
                    .map(|path| PlannedCommand { command, path })
                    .map_err(|source| ProcessError::PathSafety {
                        line: command.source_line,
                        source,
                    })
            })
            .collect()
    }

    /// Apply commands sequentially, stopping at the first failure
    pub async fn apply(&self, commands: &[Command]) -> ProcessResult {
        let planned = match self.plan(commands) {
            Ok(planned) => planned,
            Err(e) => {
                warn!(line = e.line(), "Patch rejected: {}", e);
                return ProcessResult::failed(Vec::new(), e);
            }
        };

        let mut operations = Vec::with_capacity(planned.len());
        for step in planned {
            match self.execute(step.command, step.path).await {
                Ok(op) => {
                    info!(kind = %op.kind, path = %op.path, "Applied");
                    operations.push(op);
                }
                Err(e) => {
                    warn!(
                        line = e.line(),
                        applied = operations.len(),
                        "Patch halted: {}",
                        e
                    );
                    return ProcessResult::failed(operations, e);
                }
            }
        }

        ProcessResult::succeeded(operations)
    }

    async fn execute(&self, command: &Command, path: String) -> Result<Operation, ProcessError> {
        let line = command.source_line;
        let io = |source: FsError| ProcessError::Io { line, source };

        match command.kind {
            CommandKind::Insert | CommandKind::Upsert => {
                let previous = self.previous_content(&path).await.map_err(io)?;
                let previous_binary = previous.is_binary();
                if let Some(parent) = path::parent_dir(&path) {
                    self.fs.mkdir(parent).await.map_err(io)?;
                }
                self.fs
                    .write_file(&path, &command.content)
                    .await
                    .map_err(io)?;

                Ok(Operation {
                    kind: command.kind,
                    path,
                    applied_content: Some(command.content.clone()),
                    previous_content: previous.into_text(),
                    previous_binary,
                })
            }
            CommandKind::Delete => {
                let previous = self.previous_content(&path).await.map_err(io)?;
                let previous_binary = previous.is_binary();
                if previous.exists() {
                    self.fs.remove_file(&path).await.map_err(io)?;
                } else {
                    debug!(path = %path, "Delete target absent, nothing to do");
                }

                Ok(Operation {
                    kind: CommandKind::Delete,
                    path,
                    applied_content: None,
                    previous_content: previous.into_text(),
                    previous_binary,
                })
            }
            CommandKind::Revert => Err(ProcessError::NotImplemented {
                line,
                kind: CommandKind::Revert,
            }),
        }
    }

    async fn previous_content(&self, path: &str) -> Result<Previous, FsError> {
        if !self.fs.exists(path).await? {
            return Ok(Previous::Absent);
        }
        match self.fs.read_file(path).await {
            Ok(text) => Ok(Previous::Text(text)),
            Err(e) if e.source.kind() == io::ErrorKind::InvalidData => {
                debug!(path = %path, "Target is not UTF-8 text, previous content not captured");
                Ok(Previous::Binary)
            }
            Err(e) => Err(e),
        }
    }
}

/// What a target held before a command touched it
enum Previous {
    Absent,
    Text(String),
    Binary,
}

impl Previous {
    fn exists(&self) -> bool {
        !matches!(self, Previous::Absent)
    }

    fn is_binary(&self) -> bool {
        matches!(self, Previous::Binary)
    }

    fn into_text(self) -> Option<String> {
        match self {
            Previous::Text(text) => Some(text),
            Previous::Absent | Previous::Binary => None,
        }
    }
}
