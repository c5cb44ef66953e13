//! Core primitives for patchd
//!
//! This crate provides:
//! - Patch parsing into ordered commands (both marker syntaxes)
//! - Target path safety checks
//! - A file system port with a local adapter
//! - The patch processor: plan, execute in order, stop at the first failure
//! - Revert patch generation from recorded operations

pub mod command;
pub mod fs;
pub mod parser;
pub mod patch;
pub mod path;
pub mod processor;
pub mod revert;

#[cfg(test)]
pub mod testing;

pub use command::{Command, CommandKind, Operation};
pub use fs::{FileSystemPort, FsError, LocalFs};
pub use parser::{parse, parse_document, Document, ParseError};
pub use patch::{Patch, PatchStatus};
pub use path::PathSafetyError;
pub use processor::{PatchProcessor, PlannedCommand, ProcessError, ProcessResult};
pub use revert::RenderError;
