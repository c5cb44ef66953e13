//! Prune the sequence log to the retention policy

use crate::config::Config;
use crate::locks::DispatcherLock;
use crate::util::RepoLayout;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use patchd_journal::{GarbageCollector, PatchLog};
use std::path::Path;

pub async fn run() -> Result<()> {
    // 1. Find repository root
    let layout = RepoLayout::discover().context("Failed to find repository")?;
    let config = Config::load(&layout.config_path())?;

    // 2. Exclude a running dispatcher
    let _lock = DispatcherLock::acquire(&layout.lock_path(), Path::new(&config.watch.directory))?;

    let sequence_dir = layout.sequence_dir();
    if !sequence_dir.exists() {
        println!("{}", "Nothing to collect - no patches applied yet".dimmed());
        return Ok(());
    }

    // 3. Prune the log
    let log = PatchLog::open(&sequence_dir).context("Failed to open sequence log")?;
    let policy = config.retention();
    let gc = GarbageCollector::new(policy.clone());

    println!("{}", "Running Garbage Collection...".bold());
    println!();

    let report = gc.collect(&log)?;

    // 4. Delete revert artifacts of pruned entries
    let mut artifacts_deleted = 0;
    for artifact in &report.artifacts {
        match std::fs::remove_file(layout.absolute(artifact)) {
            Ok(()) => artifacts_deleted += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to delete {}", artifact.display()))
            }
        }
    }

    // 5. Display results
    println!("{}", "GC Complete".green().bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    if report.removed.is_empty() {
        println!(
            "{}",
            format!("Nothing to collect - {} entries within the limit of {}", log.count(), policy.max_entries).dimmed()
        );
    } else {
        println!("Entries removed:   {}", report.removed.len().to_string().yellow());
        println!("Reverts deleted:   {}", artifacts_deleted.to_string().yellow());
        println!("Entries kept:      {}", log.count());
    }

    Ok(())
}
