//! tracklink: keep Jira issues and ClickUp tasks paired and in step.
//!
//! # Usage
//!
//! ```text
//! tracklink [--config PATH] init [--force]
//! tracklink [--config PATH] sync [--dry-run]
//! tracklink [--config PATH] daemon [--minutes N] [--log-file]
//! tracklink [--config PATH] status [--json]
//! tracklink [--config PATH] inspect <tickets|board> <id>
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonArgs, init::InitArgs, inspect::InspectArgs, status::StatusArgs, sync::SyncArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "tracklink",
    version,
    about = "Two-way sync of Jira issues and ClickUp tasks",
    long_about = None,
)]
struct Cli {
    /// Config file to use instead of ~/.tracklink/config.yaml.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter config file.
    Init(InitArgs),

    /// Run one sync pass and exit.
    Sync(SyncArgs),

    /// Run sync passes forever, pausing between them.
    Daemon(DaemonArgs),

    /// Show linked pairs and the daemon's last pass.
    Status(StatusArgs),

    /// Fetch one item from a backend and show its link.
    Inspect(InspectArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Init(args) => args.run(config),
        Commands::Sync(args) => args.run(config),
        Commands::Daemon(args) => args.run(config),
        Commands::Status(args) => args.run(config),
        Commands::Inspect(args) => args.run(config),
    }
}
