//! nrtk-sync: keep a static copy of an NRTK instance up to date.
//!
//! # Usage
//!
//! ```text
//! nrtk-sync sync [--dry-run]
//! nrtk-sync run [-i SECS]
//! nrtk-sync status [--json]
//! ```
//!
//! Every subcommand accepts the global settings (`--api-url`, `--api-token`,
//! `--base-dir`, `-l/--log-level`, `-c/--config`, ...), each of which can
//! also come from its environment variable or the YAML config file.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{run::RunArgs, status::StatusArgs, sync::SyncArgs, GlobalArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "nrtk-sync",
    version,
    about = "Mirror NRTK instance content into a local static site",
    long_about = None,
    after_help = "Learn more at nrtk.app",
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run exactly one sync cycle.
    Sync(SyncArgs),

    /// Sync once, or repeatedly with --interval.
    Run(RunArgs),

    /// Show the committed snapshot and the archive (no network access).
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => args.run(&cli.global),
        Commands::Run(args) => args.run(&cli.global),
        Commands::Status(args) => args.run(&cli.global),
    }
}
