//! Parse and plan a patch without touching the tree

use crate::util::{self, RepoLayout, RESERVED_DIR};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use patchd_core::{FileSystemPort, LocalFs, Patch, PatchProcessor};
use std::path::Path;
use std::sync::Arc;

pub async fn run(file: &Path) -> Result<()> {
    let layout = RepoLayout::discover()?;
    let path = util::resolve_user_path(file)?;
    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let patch = Patch::from_file(&path, &content)
        .map_err(|e| anyhow::anyhow!("{}: line {}: {}", file.display(), e.line(), e))?;

    let fs = Arc::new(LocalFs::new(layout.root()));
    let processor = PatchProcessor::new(fs.clone()).with_reserved_dir(RESERVED_DIR);
    let planned = processor
        .plan(&patch.commands)
        .map_err(|e| anyhow::anyhow!("{}: line {}: {}", file.display(), e.line(), e))?;

    println!("{} {}", "Patch".bold(), patch.id);
    if let Some(message) = &patch.commit_message {
        println!("  Message:   {}", message);
    }
    let digest = &patch.digest[..16];
    println!("  Digest:    {}", digest.dimmed());
    println!("  Commands:  {}", planned.len());
    println!();

    for step in &planned {
        let exists = fs.exists(&step.path).await?;
        let note = if exists { "exists".yellow().to_string() } else { "new".green().to_string() };
        println!(
            "  {:>4}  {:<7} {} ({})",
            step.command.source_line,
            step.command.kind.to_string().cyan(),
            step.path,
            note
        );
    }

    println!();
    println!("{}", "Patch is valid".green());
    Ok(())
}
