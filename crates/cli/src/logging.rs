//! Tracing subscriber setup

use anyhow::{Context, Result};
use std::io::IsTerminal;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable overriding the log filter
pub const LOG_ENV: &str = "PATCHD_LOG";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Logging for one-shot commands: stderr only, quiet by default
pub fn init_cli() {
    let _ = tracing_subscriber::registry()
        .with(env_filter("warn"))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

/// Logging for the dispatcher: `log_file`, plus stderr when it is a terminal
///
/// A background dispatcher has its stderr appended to the same file, so the
/// stderr layer is skipped there. The returned guard flushes the file writer
/// on drop and must be held for the dispatcher's lifetime.
pub fn init_dispatcher(log_file: &Path, default_level: &str) -> Result<WorkerGuard> {
    let dir = log_file
        .parent()
        .context("Log file has no parent directory")?;
    let name = log_file
        .file_name()
        .context("Log file has no file name")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));

    let _ = tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            std::io::stderr()
                .is_terminal()
                .then(|| fmt::layer().with_writer(std::io::stderr).with_target(false)),
        )
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init();

    Ok(guard)
}
