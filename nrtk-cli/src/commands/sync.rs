//! `nrtk-sync sync`: one fetch / archive / write / commit cycle.

use anyhow::{Context, Result};
use clap::Args;
use nrtk_core::SyncConfig;
use nrtk_sync::{ChangeSet, CycleOutcome, HttpFetcher, Synchronizer, WriteResult};

use super::{init_logging, GlobalArgs};

/// Arguments for `nrtk-sync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Fetch and report what would change without touching the disk.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let layer = global.layer()?;
        init_logging(&layer)?;
        let config = SyncConfig::resolve(layer).context("invalid configuration")?;

        let fetcher = HttpFetcher::new(
            &config.api_url,
            &config.api_token,
            &config.auth_scheme,
            config.timeout,
        )
        .context("failed to set up the API client")?;
        let sync = Synchronizer::new(fetcher, config.layout);

        let outcome = sync.run_once(self.dry_run).context("update unsuccessful")?;
        print_outcome(&outcome);
        Ok(())
    }
}

fn print_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Unchanged { checksum } => {
            println!("✓ content is up to date ({checksum})");
        }
        CycleOutcome::Updated {
            previous,
            current,
            archived,
            removed,
            writes,
            changes,
        } => {
            let from = previous.as_ref().map_or("none", |c| c.as_str());
            println!(
                "✓ updated {from} → {current} ({} written, {})",
                writes.len(),
                summarize(changes)
            );
            if let Some(archived) = archived {
                println!(
                    "  snapshot {} archived to {} ({} files)",
                    archived.checksum,
                    archived.path.display(),
                    archived.items.len()
                );
            }
            for path in removed {
                println!("  ✗  {}", path.display());
            }
            print_writes(writes);
        }
        CycleOutcome::WouldUpdate {
            previous,
            current,
            writes,
            changes,
        } => {
            let from = previous.as_ref().map_or("none", |c| c.as_str());
            println!(
                "[dry-run] ✓ {from} → {current} would write {} files ({})",
                writes.len(),
                summarize(changes)
            );
            for file in &changes.removed {
                println!("  -  {file}");
            }
            print_writes(writes);
        }
    }
}

fn print_writes(writes: &[WriteResult]) {
    for write in writes {
        match write {
            WriteResult::Written { path } => println!("  ✎  {}", path.display()),
            WriteResult::WouldWrite { path } => println!("  ~  {}", path.display()),
        }
    }
}

fn summarize(changes: &ChangeSet) -> String {
    format!(
        "{} added, {} updated, {} removed",
        changes.added.len(),
        changes.updated.len(),
        changes.removed.len()
    )
}
