//! Show dispatcher status

use crate::config::Config;
use crate::locks;
use crate::util::{self, RepoLayout};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use patchd_journal::{DispatcherState, EntryKind, PatchLog};

pub async fn run() -> Result<()> {
    // 1. Find repository root
    let layout = RepoLayout::discover().context("Failed to find repository")?;
    let config = Config::load(&layout.config_path())?;

    // 2. Check dispatcher status
    let owner = locks::read_owner(&layout.lock_path());
    let state = DispatcherState::load(&layout.state_path())?;

    // 3. Latest log entry (the log may not exist yet)
    let sequence_dir = layout.sequence_dir();
    let (latest, count) = if sequence_dir.exists() {
        let log = PatchLog::open(&sequence_dir).context("Failed to open sequence log")?;
        (log.latest()?, log.count())
    } else {
        (None, 0)
    };

    // 4. Display output
    println!("{}", "Patch Dispatcher Status".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    println!("Repository:    {}", layout.root().display().to_string().cyan());
    println!();

    print!("Dispatcher:    ");
    match &owner {
        Some(owner) if owner.is_alive() => {
            println!("{}", "Running ✓".green());
            println!("  PID:         {}", owner.pid);
            println!("  Watching:    {}", owner.watch_dir.display());
            println!("  Started:     {}", util::format_relative_time(owner.started_at));
        }
        Some(owner) => {
            println!("{}", "Not running (stale lock)".yellow());
            println!("  {}", format!("pid {} is gone; 'pd stop' clears the lock", owner.pid).dimmed());
        }
        None => {
            println!("{}", "Not running".yellow());
            println!("  Watch dir:   {}", config.watch.directory);
            println!("  {}", "Tip: Start with 'pd start'".dimmed());
        }
    }
    println!();

    print!("Last failed:   ");
    match &state.last_failed_patch {
        Some(path) => {
            println!("{}", path.display().to_string().red());
            println!("  {}", "Fix it and run 'pd retry'".dimmed());
        }
        None => println!("{}", "none".dimmed()),
    }
    println!();

    println!("Latest entry:");
    match latest {
        Some(entry) => {
            let kind = match entry.kind {
                EntryKind::Applied => "applied".green().to_string(),
                EntryKind::Reverted { .. } => "reverted".yellow().to_string(),
            };
            println!("  ID:          {}", util::short_id(&entry.id).yellow());
            println!(
                "  Time:        {} ({})",
                util::format_relative_time(entry.ts_unix_ms),
                util::format_absolute_time(entry.ts_unix_ms).dimmed()
            );
            println!("  Patch:       {} [{}]", entry.patch_id, kind);
            if let Some(message) = &entry.commit_message {
                println!("  Message:     {}", message);
            }
            println!("  Operations:  {}", entry.operations.len());
        }
        None => println!("  {}", "No patches applied yet".dimmed()),
    }
    println!();
    println!("Log entries:   {}", count);

    Ok(())
}
