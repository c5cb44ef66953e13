//! Patch file parser
//!
//! Turns patch text into an ordered list of [`Command`]s. Two marker
//! syntaxes are accepted and may be mixed within one file:
//!
//! ```text
//! START INSERT path/to/new.txt          /* COMMAND UPSERT PATH src/lib.rs */
//! hello world                           pub fn answer() -> u32 { 42 }
//! END INSERT                            /* COMMAND UPSERT END */
//! ```
//!
//! When the start marker carries no path, the block must open with a path
//! block, either on three lines (`/*ST`, path, `ST*/`) or on one
//! (`/*ST path ST*/`).
//!
//! A third form has no end marker: a `### INSERT` section header (kind in
//! upper case) opens a section that runs until the next marker of any form
//! or the end of the file. Trailing blank lines of a section are dropped.
//!
//! ```text
//! ### INSERT
//! /*ST docs/notes.md ST*/
//! first note
//!
//! ### DELETE
//! /*ST docs/old.md ST*/
//! ```
//!
//! Content is every line between the markers joined with `\n`. The line
//! break right before the end marker belongs to the marker, so a block whose
//! content must end in a newline carries one empty line before `END`.

use crate::command::{Command, CommandKind};
use thiserror::Error;

/// Prefix of the reserved commit-message line
pub const COMMIT_PREFIX: &str = "commit:";

const PATH_OPEN: &str = "/*ST";
const PATH_CLOSE: &str = "ST*/";

/// Errors produced while parsing a patch
///
/// Every variant carries the 1-based line it refers to. Parsing has no side
/// effects, so any of these aborts a patch cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("nested command at line {line}: {open_kind} block from line {open_line} is still open")]
    NestedCommand {
        line: usize,
        open_kind: CommandKind,
        open_line: usize,
    },

    #[error("command mismatch at line {line}: started with {expected}, ended with {found}")]
    CommandMismatch {
        line: usize,
        expected: CommandKind,
        found: CommandKind,
    },

    #[error("end of {token} command without start at line {line}")]
    DanglingEnd { line: usize, token: String },

    #[error("unclosed {kind} command starting at line {line}")]
    UnclosedCommand { line: usize, kind: CommandKind },

    #[error("unknown command '{token}' at line {line}")]
    UnknownCommand { line: usize, token: String },

    #[error("{kind} command at line {line} has no target path")]
    MissingPath { line: usize, kind: CommandKind },

    #[error("malformed path block at line {line}")]
    MalformedPathBlock { line: usize },

    #[error("path block outside any command at line {line}")]
    PathBlockOutsideCommand { line: usize },
}

impl ParseError {
    /// Line the error refers to
    pub fn line(&self) -> usize {
        match self {
            ParseError::NestedCommand { line, .. }
            | ParseError::CommandMismatch { line, .. }
            | ParseError::DanglingEnd { line, .. }
            | ParseError::UnclosedCommand { line, .. }
            | ParseError::UnknownCommand { line, .. }
            | ParseError::MissingPath { line, .. }
            | ParseError::MalformedPathBlock { line }
            | ParseError::PathBlockOutsideCommand { line } => *line,
        }
    }
}

/// Everything a patch file declares
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Commands in start-marker order
    pub commands: Vec<Command>,
    /// Message from the first `commit:` line outside any block
    pub commit_message: Option<String>,
}

/// Parse patch text into commands
pub fn parse(content: &str) -> Result<Vec<Command>, ParseError> {
    Ok(parse_document(content)?.commands)
}

/// Parse patch text into commands plus patch-level metadata
pub fn parse_document(content: &str) -> Result<Document, ParseError> {
    let lines: Vec<&str> = content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    let mut doc = Document::default();
    let mut open: Option<OpenBlock<'_>> = None;
    let mut idx = 0;

    while idx < lines.len() {
        let line = lines[idx];
        let line_no = idx + 1;
        idx += 1;

        let marker = classify(line);

        // Sections have no end marker; any marker closes them
        if marker.is_some() && open.as_ref().is_some_and(|block| block.section) {
            if let Some(block) = open.take() {
                doc.commands.push(block.finish()?);
            }
        }

        match marker {
            Some(Marker::Header { kind, path }) => {
                if let Some(block) = &open {
                    return Err(ParseError::NestedCommand {
                        line: line_no,
                        open_kind: block.kind,
                        open_line: block.start_line,
                    });
                }
                open = Some(OpenBlock {
                    kind,
                    start_line: line_no,
                    path: path.map(str::to_string),
                    lines: Vec::new(),
                    section: true,
                });
            }
            Some(Marker::Start { token, path }) => {
                if let Some(block) = &open {
                    return Err(ParseError::NestedCommand {
                        line: line_no,
                        open_kind: block.kind,
                        open_line: block.start_line,
                    });
                }
                let kind = resolve_kind(token, line_no)?;
                open = Some(OpenBlock {
                    kind,
                    start_line: line_no,
                    path: path.map(str::to_string),
                    lines: Vec::new(),
                    section: false,
                });
            }
            Some(Marker::End { token }) => {
                let block = open.take().ok_or_else(|| ParseError::DanglingEnd {
                    line: line_no,
                    token: token.to_string(),
                })?;
                let kind = resolve_kind(token, line_no)?;
                if kind != block.kind {
                    return Err(ParseError::CommandMismatch {
                        line: line_no,
                        expected: block.kind,
                        found: kind,
                    });
                }
                doc.commands.push(block.finish()?);
            }
            None => match open.as_mut() {
                Some(block) if block.accepts_path_block() && is_path_open(line) => {
                    let (path, consumed) = read_path_block(&lines, idx - 1)?;
                    block.path = Some(path);
                    block.lines.clear();
                    idx += consumed - 1;
                }
                Some(block) => block.lines.push(line),
                None if is_path_open(line) => {
                    return Err(ParseError::PathBlockOutsideCommand { line: line_no });
                }
                None => {
                    if doc.commit_message.is_none() {
                        doc.commit_message = commit_message(line);
                    }
                }
            },
        }
    }

    match open {
        Some(block) if block.section => doc.commands.push(block.finish()?),
        Some(block) => {
            return Err(ParseError::UnclosedCommand {
                line: block.start_line,
                kind: block.kind,
            });
        }
        None => {}
    }

    Ok(doc)
}

/// A block whose start marker has been seen but not its end marker
struct OpenBlock<'a> {
    kind: CommandKind,
    start_line: usize,
    path: Option<String>,
    lines: Vec<&'a str>,
    /// Opened by a `###` header; closed by the next marker or end of input
    section: bool,
}

impl OpenBlock<'_> {
    /// A path block is only recognized before any content
    fn accepts_path_block(&self) -> bool {
        self.path.is_none() && self.lines.iter().all(|l| l.trim().is_empty())
    }

    fn finish(mut self) -> Result<Command, ParseError> {
        if self.section {
            while self.lines.last().is_some_and(|l| l.trim().is_empty()) {
                self.lines.pop();
            }
        }
        let path = match self.path {
            Some(path) if !path.is_empty() => path,
            _ => {
                return Err(ParseError::MissingPath {
                    line: self.start_line,
                    kind: self.kind,
                })
            }
        };
        Ok(Command::new(
            self.kind,
            path,
            self.lines.join("\n"),
            self.start_line,
        ))
    }
}

/// Marker lines recognized by the scanner
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Marker<'a> {
    Start { token: &'a str, path: Option<&'a str> },
    End { token: &'a str },
    Header { kind: CommandKind, path: Option<&'a str> },
}

/// Classify a line as a start/end marker, or `None` for ordinary content
pub(crate) fn classify(line: &str) -> Option<Marker<'_>> {
    let trimmed = line.trim();

    if let Some(inner) = trimmed
        .strip_prefix("/*")
        .and_then(|rest| rest.strip_suffix("*/"))
    {
        let mut words = inner.split_whitespace();
        if words.next() != Some("COMMAND") {
            return None;
        }
        let token = words.next()?;
        let rest: Vec<&str> = words.collect();
        return match rest.as_slice() {
            [] => Some(Marker::Start { token, path: None }),
            ["END"] => Some(Marker::End { token }),
            ["PATH", path] => Some(Marker::Start {
                token,
                path: Some(path),
            }),
            _ => None,
        };
    }

    if let Some(rest) = keyword_rest(trimmed, "###") {
        let (token, path) = match rest.split_once(char::is_whitespace) {
            Some((token, path)) => (token, Some(path.trim())),
            None => (rest, None),
        };
        // Only exact upper-case kinds, so markdown headings stay content
        let kind = CommandKind::ALL.into_iter().find(|k| k.token() == token)?;
        return Some(Marker::Header {
            kind,
            path: path.filter(|p| !p.is_empty()),
        });
    }

    if let Some(rest) = keyword_rest(trimmed, "START") {
        let (token, path) = match rest.split_once(char::is_whitespace) {
            Some((token, path)) => (token, Some(path.trim())),
            None => (rest, None),
        };
        return Some(Marker::Start {
            token,
            path: path.filter(|p| !p.is_empty()),
        });
    }

    if let Some(rest) = keyword_rest(trimmed, "END") {
        if rest.contains(char::is_whitespace) {
            return None;
        }
        return Some(Marker::End { token: rest });
    }

    None
}

/// `KEYWORD <rest>` with at least one whitespace after the keyword and a non-empty rest
fn keyword_rest<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

fn resolve_kind(token: &str, line: usize) -> Result<CommandKind, ParseError> {
    CommandKind::from_token(token).ok_or_else(|| ParseError::UnknownCommand {
        line,
        token: token.to_string(),
    })
}

fn is_path_open(line: &str) -> bool {
    line.trim_start().starts_with(PATH_OPEN)
}

/// Read a path block starting at `start` (0-based); returns the path and
/// the number of lines consumed
fn read_path_block(lines: &[&str], start: usize) -> Result<(String, usize), ParseError> {
    let malformed = || ParseError::MalformedPathBlock { line: start + 1 };
    let first = lines[start].trim();

    // /*ST path ST*/
    if let Some(inner) = first
        .strip_prefix(PATH_OPEN)
        .and_then(|rest| rest.strip_suffix(PATH_CLOSE))
    {
        let path = inner.trim();
        return if path.is_empty() {
            Err(malformed())
        } else {
            Ok((path.to_string(), 1))
        };
    }

    if first != PATH_OPEN {
        return Err(malformed());
    }

    let path_line = lines.get(start + 1).map(|l| l.trim()).ok_or_else(malformed)?;

    // /*ST
    // path ST*/
    if let Some(path) = path_line.strip_suffix(PATH_CLOSE) {
        let path = path.trim();
        return if path.is_empty() {
            Err(malformed())
        } else {
            Ok((path.to_string(), 2))
        };
    }

    // /*ST
    // path
    // ST*/
    let close = lines.get(start + 2).map(|l| l.trim());
    if path_line.is_empty() || close != Some(PATH_CLOSE) {
        return Err(malformed());
    }
    Ok((path_line.to_string(), 3))
}

fn commit_message(line: &str) -> Option<String> {
    let message = line.trim().strip_prefix(COMMIT_PREFIX)?.trim();
    (!message.is_empty()).then(|| message.to_string())
}
