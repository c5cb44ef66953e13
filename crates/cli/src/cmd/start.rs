//! Start the patch dispatcher

use crate::config::Config;
use crate::daemon::Dispatcher;
use crate::locks;
use crate::logging;
use crate::util::RepoLayout;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::time::Duration;

pub async fn run(dir: Option<String>, foreground: bool) -> Result<()> {
    let layout = RepoLayout::discover()?;
    let mut config = Config::load(&layout.config_path())?;
    if let Some(dir) = &dir {
        config = config.with_watch_dir(dir)?;
    }

    if foreground {
        run_foreground(layout, config).await
    } else {
        start_background(&layout, dir.as_deref()).await
    }
}

async fn run_foreground(layout: RepoLayout, config: Config) -> Result<()> {
    let _guard = logging::init_dispatcher(&layout.log_file(), &config.log.level)?;

    let watch_dir = config.watch.directory.clone();
    let mut dispatcher = Dispatcher::open(layout, config)?;
    let (stream, handle) = dispatcher.open_stream()?;

    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        handle.stop();
    });

    tracing::info!(pid = std::process::id(), dir = %watch_dir, "Dispatcher started");
    dispatcher.run(stream).await?;
    Ok(())
}

async fn start_background(layout: &RepoLayout, dir: Option<&str>) -> Result<()> {
    use std::fs::OpenOptions;
    use std::process::{Command, Stdio};

    if let Some(owner) = locks::read_owner(&layout.lock_path()).filter(|o| o.is_alive()) {
        anyhow::bail!("Dispatcher already running (pid {})", owner.pid);
    }

    layout.ensure_dirs()?;
    let log_file = layout.log_file();

    // Get current executable path
    let exe = std::env::current_exe().context("Failed to get current executable path")?;

    // Append mode: the child's tracing writer shares this file
    let log_writer = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .context("Failed to open log file")?;

    let mut command = Command::new("nohup");
    command.arg(&exe).arg("start");
    if let Some(dir) = dir {
        command.arg(dir);
    }
    command
        .arg("--foreground")
        .current_dir(layout.root())
        .stdin(Stdio::null())
        .stdout(log_writer.try_clone()?)
        .stderr(log_writer)
        .spawn()
        .context("Failed to spawn dispatcher process")?;

    // Wait a moment to verify it started
    tokio::time::sleep(Duration::from_millis(500)).await;

    match locks::read_owner(&layout.lock_path()).filter(|o| o.is_alive()) {
        Some(owner) => {
            println!("{} (pid {})", "Dispatcher started".green(), owner.pid);
            println!("Watching: {}", owner.watch_dir.display().to_string().cyan());
            println!("Logs:     {}", log_file.display());
            Ok(())
        }
        None => anyhow::bail!(
            "Dispatcher failed to start (check logs at {})",
            log_file.display()
        ),
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
