//! Revert the most recent patches

use crate::config::Config;
use crate::daemon::Dispatcher;
use crate::util::{self, RepoLayout};
use anyhow::Result;
use owo_colors::OwoColorize;

pub async fn run(count: usize) -> Result<()> {
    let layout = RepoLayout::discover()?;
    let config = Config::load(&layout.config_path())?;

    let mut dispatcher = Dispatcher::open(layout, config)?;
    let markers = dispatcher.revert_last(count).await?;

    println!("{} {} patch(es)", "Reverted".green().bold(), markers.len());
    for marker in &markers {
        println!(
            "  {} {} ({} operations)",
            util::short_id(&marker.id).yellow(),
            marker.patch_id,
            marker.operations.len()
        );
    }
    Ok(())
}
