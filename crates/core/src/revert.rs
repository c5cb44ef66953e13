//! Revert patch generation
//!
//! A completed patch's operations carry the content each target had before
//! it was touched. Inverting them in reverse order gives a patch that puts
//! the tree back; [`render`] writes it in the START/END syntax so it can be
//! replayed through the normal processor path.

use crate::command::{Command, CommandKind, Operation};
use crate::parser::{classify, COMMIT_PREFIX};
use thiserror::Error;

/// Content that cannot be written as a patch block without changing meaning
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("content for '{path}' has a marker line at line {line}")]
    MarkerInContent { path: String, line: usize },

    #[error("content for '{path}' has a carriage return at line {line}")]
    CarriageReturn { path: String, line: usize },

    #[error("target path '{0}' cannot be written on a marker line")]
    UnrepresentablePath(String),

    #[error("previous content of '{0}' was not text and was not captured")]
    BinaryContent(String),
}

/// Commands that undo `operations`, newest first
///
/// Generated commands have `source_line` 0 until rendered and re-parsed.
pub fn inverse_commands(operations: &[Operation]) -> Vec<Command> {
    operations
        .iter()
        .rev()
        .filter_map(|op| match (op.kind, &op.previous_content) {
            (CommandKind::Insert | CommandKind::Upsert, Some(previous)) => Some(Command::new(
                CommandKind::Upsert,
                op.path.clone(),
                previous.clone(),
                0,
            )),
            (CommandKind::Insert | CommandKind::Upsert, None) => {
                Some(Command::new(CommandKind::Delete, op.path.clone(), "", 0))
            }
            (CommandKind::Delete, Some(previous)) => Some(Command::new(
                CommandKind::Insert,
                op.path.clone(),
                previous.clone(),
                0,
            )),
            (CommandKind::Delete, None) | (CommandKind::Revert, _) => None,
        })
        .collect()
}

/// Render commands as patch text that parses back to the same commands
pub fn render(commit_message: Option<&str>, commands: &[Command]) -> Result<String, RenderError> {
    let mut out = String::new();

    if let Some(message) = commit_message {
        let single_line = message.split_whitespace().collect::<Vec<_>>().join(" ");
        out.push_str(&format!("{COMMIT_PREFIX} {single_line}\n"));
    }

    for command in commands {
        check_path(&command.target_path)?;
        check_content(&command.target_path, &command.content)?;

        out.push_str(&format!("START {} {}\n", command.kind, command.target_path));
        if !command.content.is_empty() {
            out.push_str(&command.content);
            out.push('\n');
        }
        out.push_str(&format!("END {}\n", command.kind));
    }

    Ok(out)
}

/// Patch text that undoes `operations`
pub fn revert_patch(reverted_id: &str, operations: &[Operation]) -> Result<String, RenderError> {
    if let Some(op) = operations.iter().find(|op| op.previous_binary) {
        return Err(RenderError::BinaryContent(op.path.clone()));
    }
    render(
        Some(&format!("revert {reverted_id}")),
        &inverse_commands(operations),
    )
}

fn check_path(path: &str) -> Result<(), RenderError> {
    if path.trim() != path || path.is_empty() || path.contains(['\n', '\r']) {
        return Err(RenderError::UnrepresentablePath(path.to_string()));
    }
    Ok(())
}

fn check_content(path: &str, content: &str) -> Result<(), RenderError> {
    for (idx, line) in content.split('\n').enumerate() {
        if line.contains('\r') {
            return Err(RenderError::CarriageReturn {
                path: path.to_string(),
                line: idx + 1,
            });
        }
        if classify(line).is_some() {
            return Err(RenderError::MarkerInContent {
                path: path.to_string(),
                line: idx + 1,
            });
        }
    }
    Ok(())
}
