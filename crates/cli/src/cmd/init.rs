//! Initialize patchd in a repository

use crate::config::Config;
use crate::util::{self, RepoLayout, RESERVED_DIR};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

pub async fn run() -> Result<()> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    let root = util::find_repo_root().unwrap_or(current_dir);
    let layout = RepoLayout::new(&root);

    let already = layout.reserved_dir().is_dir();
    layout.ensure_dirs()?;

    let config_path = layout.config_path();
    if !config_path.exists() {
        Config::default().save(&config_path)?;
    }
    let config = Config::load(&config_path)?;

    let watch_dir = root.join(&config.watch.directory);
    std::fs::create_dir_all(&watch_dir)
        .with_context(|| format!("Failed to create {}", watch_dir.display()))?;

    if already {
        println!("patchd already initialized at {}", root.display().to_string().cyan());
        return Ok(());
    }

    println!("Initialized patchd at {}", root.display().to_string().cyan());
    println!();
    println!("Created:");
    println!("  - {}/config.toml   (configuration)", RESERVED_DIR);
    println!("  - {}/reverts/      (revert patches)", RESERVED_DIR);
    println!("  - {}/logs/         (dispatcher logs)", RESERVED_DIR);
    println!("  - {}/   (drop patch files here)", config.watch.directory);
    println!();
    println!("Next steps:");
    println!("  - Run 'pd start' to watch for patches");
    println!("  - Run 'pd apply <file>' to apply one patch now");
    Ok(())
}
