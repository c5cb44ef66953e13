//! patchd CLI - pd command

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli_lib::{cmd, logging};
use std::path::PathBuf;

/// patchd - apply patch files dropped into a watched directory
#[derive(Parser)]
#[command(name = "pd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize patchd in the current repository
    Init,
    /// Start the dispatcher
    Start {
        /// Directory to watch, relative to the repository root
        dir: Option<String>,
        /// Run in foreground (for debugging)
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the dispatcher
    Stop,
    /// Show dispatcher status
    Status,
    /// Apply a patch file immediately (requires the dispatcher to be stopped)
    Apply {
        /// Patch file
        file: PathBuf,
    },
    /// Parse and plan a patch file without applying it
    Check {
        /// Patch file
        file: PathBuf,
    },
    /// Retry the last failed patch (requires the dispatcher to be stopped)
    Retry,
    /// Revert the most recently applied patches (requires the dispatcher to be stopped)
    Revert {
        /// Number of patches to revert
        #[arg(default_value = "1")]
        n: usize,
    },
    /// Show the sequence log
    Log {
        /// Number of entries to show (default: 20)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Prune the sequence log (requires the dispatcher to be stopped)
    Gc,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The foreground dispatcher installs its own file logging
    if !matches!(cli.command, Commands::Start { foreground: true, .. }) {
        logging::init_cli();
    }

    match cli.command {
        Commands::Init => cmd::init::run().await,
        Commands::Start { dir, foreground } => cmd::start::run(dir, foreground).await,
        Commands::Stop => cmd::stop::run().await,
        Commands::Status => cmd::status::run().await,
        Commands::Apply { file } => cmd::apply::run(&file).await,
        Commands::Check { file } => cmd::check::run(&file).await,
        Commands::Retry => cmd::retry::run().await,
        Commands::Revert { n } => cmd::revert::run(n).await,
        Commands::Log { limit } => cmd::log::run(limit).await,
        Commands::Gc => cmd::gc::run().await,
    }
}
