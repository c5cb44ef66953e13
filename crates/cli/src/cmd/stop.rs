//! Stop the patch dispatcher

use crate::locks;
use crate::util::RepoLayout;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::time::Duration;

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run() -> Result<()> {
    let layout = RepoLayout::discover()?;
    let lock_path = layout.lock_path();

    let Some(owner) = locks::read_owner(&lock_path) else {
        println!("{}", "No running dispatcher found".yellow());
        return Ok(());
    };

    if !owner.is_alive() {
        std::fs::remove_file(&lock_path).context("Failed to remove stale lock file")?;
        println!("{} (pid {} was not running)", "Removed stale lock".yellow(), owner.pid);
        return Ok(());
    }

    send_terminate(owner.pid)?;

    // The dispatcher removes its lock file on the way out
    let deadline = tokio::time::Instant::now() + STOP_TIMEOUT;
    while lock_path.exists() {
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("Dispatcher (pid {}) did not stop within {:?}", owner.pid, STOP_TIMEOUT);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    println!("{} (pid {})", "Dispatcher stopped".green(), owner.pid);
    Ok(())
}

#[cfg(unix)]
fn send_terminate(pid: u32) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
        .with_context(|| format!("Failed to signal dispatcher (pid {})", pid))
}

#[cfg(not(unix))]
fn send_terminate(pid: u32) -> Result<()> {
    anyhow::bail!("Stopping the dispatcher (pid {}) is only supported on unix", pid)
}
