//! `nrtk-sync status`: committed snapshot and archive listing.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use nrtk_core::{Layout, SnapshotMeta};
use nrtk_sync::writer::list_entries;
use nrtk_sync::{ArchiveStore, ArchivedSnapshot, ChecksumTracker};

use super::GlobalArgs;

/// Arguments for `nrtk-sync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let layout = global.layer()?.layout();
        let report = build_report(&layout)?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(&report);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    www_dir: PathBuf,
    bin_dir: PathBuf,
    tracked: Option<TrackedJson>,
    content_files: usize,
    archives: Vec<ArchivedSnapshot>,
}

#[derive(Debug, Serialize)]
struct TrackedJson {
    checksum: String,
    title: String,
    homepage_url: String,
    synced_at: Option<DateTime<Utc>>,
    stories: usize,
}

impl From<SnapshotMeta> for TrackedJson {
    fn from(meta: SnapshotMeta) -> Self {
        Self {
            checksum: meta.checksum.to_string(),
            title: meta.title,
            homepage_url: meta.homepage_url,
            synced_at: meta.synced_at,
            stories: meta.stories.len(),
        }
    }
}

#[derive(Tabled)]
struct ArchiveRow {
    #[tabled(rename = "snapshot")]
    checksum: String,
    #[tabled(rename = "files")]
    files: usize,
    #[tabled(rename = "archived")]
    archived: String,
}

fn build_report(layout: &Layout) -> Result<StatusReport> {
    let tracker = ChecksumTracker::new(layout.meta_path());
    let tracked = tracker
        .read_current()
        .context("failed to read the checksum tracker")?;
    let content_files = list_entries(&layout.www_dir)
        .context("failed to list the content directory")?
        .len();
    let archives = ArchiveStore::new(layout.bin_dir.clone())
        .list()
        .context("failed to list archived snapshots")?;

    Ok(StatusReport {
        www_dir: layout.www_dir.clone(),
        bin_dir: layout.bin_dir.clone(),
        tracked: tracked.map(TrackedJson::from),
        content_files,
        archives,
    })
}

fn print_table(report: &StatusReport) {
    println!(
        "nrtk-sync v{} | {} | {} archived",
        env!("CARGO_PKG_VERSION"),
        report.www_dir.display(),
        report.archives.len(),
    );
    let separator = "■".repeat(60).bright_black().to_string();
    println!("{separator}");

    match &report.tracked {
        Some(tracked) => {
            println!(
                "{} {} {}",
                "■".green().bold(),
                "SNAPSHOT".bold(),
                tracked.checksum
            );
            println!("  site      {} ({})", tracked.title, tracked.homepage_url);
            println!(
                "  content   {} stories, {} files",
                tracked.stories, report.content_files
            );
            let synced = tracked
                .synced_at
                .map(|at| format!("{} ago", format_age(at)))
                .unwrap_or_else(|| "unknown".to_string());
            println!("  synced    {synced}");
        }
        None => {
            println!(
                "{} {} no snapshot committed yet",
                "■".bright_black().bold(),
                "NEVER SYNCED".bold()
            );
        }
    }
    println!("{separator}");

    if report.archives.is_empty() {
        println!("No archived snapshots in {}.", report.bin_dir.display());
        return;
    }
    let rows: Vec<ArchiveRow> = report
        .archives
        .iter()
        .map(|snapshot| ArchiveRow {
            checksum: snapshot.checksum.clone(),
            files: snapshot.items.len(),
            archived: snapshot
                .archived_at
                .map(|at| format!("{} ago", format_age(at)))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

/// Coarse age: `42s`, `5m`, `3h`, `2d`.
fn format_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0);
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
