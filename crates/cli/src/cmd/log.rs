//! Show the sequence log

use crate::util::{self, RepoLayout};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use patchd_journal::{EntryKind, PatchLog};

const DEFAULT_LIMIT: usize = 20;

pub async fn run(limit: Option<usize>) -> Result<()> {
    let layout = RepoLayout::discover()?;
    let sequence_dir = layout.sequence_dir();

    if !sequence_dir.exists() {
        println!("{}", "No patches applied yet".dimmed());
        return Ok(());
    }

    let log = PatchLog::open(&sequence_dir).context("Failed to open sequence log")?;
    let entries = log.newest_first(limit.unwrap_or(DEFAULT_LIMIT))?;

    if entries.is_empty() {
        println!("{}", "No patches applied yet".dimmed());
        return Ok(());
    }

    println!("{} ({} total)", "Patch Log".bold(), log.count());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for entry in entries {
        let kind = match entry.kind {
            EntryKind::Applied => "applied ".green().to_string(),
            EntryKind::Reverted { target } => {
                format!("reverted {}", util::short_id(&target)).yellow().to_string()
            }
        };
        println!(
            "{} {} {} {} - {} ops",
            entry.id.to_string().yellow(),
            util::format_absolute_time(entry.ts_unix_ms).dimmed(),
            kind,
            entry.patch_id,
            entry.operations.len()
        );
        if let Some(message) = &entry.commit_message {
            println!("    {}", message);
        }
    }

    Ok(())
}
