//! Apply one patch file now

use crate::config::Config;
use crate::daemon::Dispatcher;
use crate::util::{self, RepoLayout};
use anyhow::Result;
use owo_colors::OwoColorize;
use patchd_journal::PatchLogEntry;
use std::path::Path;

pub async fn run(file: &Path) -> Result<()> {
    let layout = RepoLayout::discover()?;
    let config = Config::load(&layout.config_path())?;
    let path = util::resolve_user_path(file)?;

    let mut dispatcher = Dispatcher::open(layout, config)?;
    let entry = dispatcher.dispatch_file(&path).await?;

    print_applied(&entry);
    Ok(())
}

/// Print the operations of an applied entry
pub fn print_applied(entry: &PatchLogEntry) {
    println!(
        "{} {} ({})",
        "Applied".green().bold(),
        entry.patch_id,
        util::short_id(&entry.id).yellow()
    );
    if let Some(message) = &entry.commit_message {
        println!("  {}", message.dimmed());
    }
    for op in &entry.operations {
        println!("  {:<7} {}", op.kind.to_string().cyan(), op.path);
    }
    if entry.revert_patch.is_none() {
        println!("  {}", "No revert patch could be written for this entry".yellow());
    }
}
