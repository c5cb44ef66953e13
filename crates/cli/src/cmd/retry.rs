//! Retry the last failed patch

use crate::config::Config;
use crate::daemon::Dispatcher;
use crate::util::RepoLayout;
use anyhow::Result;

pub async fn run() -> Result<()> {
    let layout = RepoLayout::discover()?;
    let config = Config::load(&layout.config_path())?;

    let mut dispatcher = Dispatcher::open(layout, config)?;
    let entry = dispatcher.retry_last_failed().await?;

    super::apply::print_applied(&entry);
    Ok(())
}
