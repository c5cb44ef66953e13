//! Helpers for running the `pd` binary

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

/// `pd` invocation builder
pub struct PdCommand {
    working_dir: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl PdCommand {
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    #[allow(dead_code)]
    pub fn env(&mut self, key: &str, value: &str) -> &mut Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn execute(&self) -> Result<CommandResult> {
        let start = Instant::now();
        let output = Command::new(env!("CARGO_BIN_EXE_pd"))
            .args(&self.args)
            .current_dir(&self.working_dir)
            .env_remove("PATCHD_LOG")
            .envs(&self.env)
            .output()
            .context("Failed to execute pd")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }
        Ok(result)
    }

    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }
        Ok(result)
    }
}

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }

    /// Every log entry ID (26-character ULID) printed on stdout
    pub fn entry_ids(&self) -> Vec<String> {
        self.stdout.lines().filter_map(extract_ulid).collect()
    }
}

/// First ULID-looking word in a line, ignoring colour codes
pub fn extract_ulid(line: &str) -> Option<String> {
    strip_ansi(line)
        .split(|c: char| !c.is_ascii_alphanumeric())
        .find(|word| word.len() == 26 && word.starts_with('0'))
        .map(str::to_string)
}

/// Remove `ESC [ ... <letter>` sequences
pub fn strip_ansi(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Build a `pd` invocation
///
/// ```ignore
/// pd!(dir, "apply", "patches/a.patch.txt").assert_success()?;
/// ```
#[macro_export]
macro_rules! pd {
    ($dir:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::PdCommand::new($dir);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ulid_extraction() {
        let line = "\u{1b}[33m01HXKJ7NVQW3Y2YMZK5VFZX3G8\u{1b}[39m 2026-01-01 applied one";
        assert_eq!(extract_ulid(line), Some("01HXKJ7NVQW3Y2YMZK5VFZX3G8".to_string()));
        assert_eq!(extract_ulid("Patch Log (2 total)"), None);
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\u{1b}[1m\u{1b}[32mApplied\u{1b}[39m\u{1b}[0m x"), "Applied x");
        assert_eq!(strip_ansi("plain"), "plain");
    }
}
