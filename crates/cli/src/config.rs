//! `.st-patches/config.toml`

use anyhow::{Context, Result};
use patchd_journal::RetentionPolicy;
use patchd_watcher::{WatchConfig, DEFAULT_PATTERNS};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};
use std::time::Duration;

const MAX_DEBOUNCE_MS: u64 = 10_000;

/// Repository configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub watch: WatchSection,
    pub history: HistorySection,
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    /// Watch directory, relative to the repository root
    pub directory: String,
    /// Settle delay before a changed patch file is dispatched
    pub debounce_ms: u64,
    /// Glob patterns a patch file name must match
    pub patterns: Vec<String>,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            directory: "patches".to_string(),
            debounce_ms: 100,
            patterns: DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySection {
    /// Sequence log entries kept by `pd gc`
    pub max_entries: usize,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            max_entries: RetentionPolicy::default().max_entries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Default filter when `PATCHD_LOG` is unset
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load and validate; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.watch.debounce_ms > MAX_DEBOUNCE_MS {
            anyhow::bail!(
                "watch.debounce_ms must be at most {} (got {})",
                MAX_DEBOUNCE_MS,
                self.watch.debounce_ms
            );
        }
        if self.history.max_entries == 0 {
            anyhow::bail!("history.max_entries must be at least 1");
        }
        validate_watch_dir(&self.watch.directory)?;
        if self.watch.patterns.is_empty() {
            anyhow::bail!("watch.patterns must list at least one pattern");
        }
        Ok(())
    }

    /// Replace the watch directory (e.g. from `pd start <dir>`)
    pub fn with_watch_dir(mut self, dir: &str) -> Result<Self> {
        validate_watch_dir(dir)?;
        self.watch.directory = dir.to_string();
        Ok(self)
    }

    /// Watch settings rooted at `repo_root`
    pub fn watch_config(&self, repo_root: &Path) -> WatchConfig {
        WatchConfig {
            dir: repo_root.join(&self.watch.directory),
            patterns: self.watch.patterns.clone(),
            debounce: Duration::from_millis(self.watch.debounce_ms),
        }
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_entries: self.history.max_entries,
        }
    }
}

fn validate_watch_dir(dir: &str) -> Result<()> {
    let path = Path::new(dir);
    if dir.trim().is_empty() {
        anyhow::bail!("watch.directory must not be empty");
    }
    if path.is_absolute() {
        anyhow::bail!("watch.directory must be relative to the repository root: {}", dir);
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        anyhow::bail!("watch.directory must stay inside the repository: {}", dir);
    }
    Ok(())
}
