//! `nrtk-sync run`: sync once, or forever at a fixed interval.

use anyhow::{Context, Result};
use clap::Args;
use nrtk_core::SyncConfig;

use super::{init_logging, GlobalArgs};

/// Arguments for `nrtk-sync run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Repeat every SECS seconds (minimum 60). Omit or pass 0 for one cycle.
    #[arg(short = 'i', long = "interval", env = "INFINITY", value_name = "SECS")]
    pub interval_secs: Option<u64>,
}

impl RunArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let mut layer = global.layer()?;
        if self.interval_secs.is_some() {
            layer.interval_secs = self.interval_secs;
        }
        let log = init_logging(&layer)?;
        let config = SyncConfig::resolve(layer).context("invalid configuration")?;

        let summary = nrtk_daemon::start_blocking(&config, log).context("update unsuccessful")?;
        println!(
            "✓ {} cycle(s): {} updated, {} failed",
            summary.cycles, summary.updated, summary.failed
        );
        Ok(())
    }
}
