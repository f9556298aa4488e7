//! Synchronizer: one fetch / compare / archive / write / commit cycle.
//!
//! ```text
//! Idle → Fetching ─┬─ checksum equal ──→ Unchanged → Idle
//!                  └─ checksum differs → Staging → Archiving → Writing → Committed → Idle
//! ```
//!
//! The tracker is written last. Content is staged before anything in the
//! Content Store moves, and the archive target is checked before staging, so
//! fetch errors, archive conflicts and staging failures all leave the
//! published site as it was. A failure after archiving has begun leaves the
//! tracker on the old snapshot and needs manual reconciliation.

use std::fmt;
use std::path::PathBuf;

use chrono::Utc;

use nrtk_core::{Checksum, Layout, SnapshotMeta};

use crate::archive::{ArchiveStore, ArchivedSnapshot};
use crate::error::SyncError;
use crate::fetcher::Fetcher;
use crate::lock::SyncLock;
use crate::plan::{log_changes, plan_changes, ChangeSet};
use crate::tracker::ChecksumTracker;
use crate::writer::{self, WriteResult};

// ---------------------------------------------------------------------------
// Cycle state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Fetching,
    Unchanged,
    Staging,
    Archiving,
    Writing,
    Committed,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Fetching => "fetching",
            CyclePhase::Unchanged => "unchanged",
            CyclePhase::Staging => "staging",
            CyclePhase::Archiving => "archiving",
            CyclePhase::Writing => "writing",
            CyclePhase::Committed => "committed",
        };
        f.write_str(name)
    }
}

/// What a finished cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Remote checksum matches the tracked one; nothing was touched.
    Unchanged { checksum: Checksum },
    /// A new snapshot was published and committed.
    Updated {
        previous: Option<Checksum>,
        current: Checksum,
        /// `None` on the first run.
        archived: Option<ArchivedSnapshot>,
        /// Untracked files removed on the first run.
        removed: Vec<PathBuf>,
        writes: Vec<WriteResult>,
        changes: ChangeSet,
    },
    /// `--dry-run`: a new snapshot is available but nothing was written.
    WouldUpdate {
        previous: Option<Checksum>,
        current: Checksum,
        writes: Vec<WriteResult>,
        changes: ChangeSet,
    },
}

impl CycleOutcome {
    /// Checksum of the snapshot the remote currently serves.
    pub fn checksum(&self) -> &Checksum {
        match self {
            CycleOutcome::Unchanged { checksum } => checksum,
            CycleOutcome::Updated { current, .. } | CycleOutcome::WouldUpdate { current, .. } => {
                current
            }
        }
    }

    pub fn is_update(&self) -> bool {
        matches!(self, CycleOutcome::Updated { .. })
    }
}

/// Outcome plus the tracker value to carry into the next cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub tracked: Option<SnapshotMeta>,
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

pub struct Synchronizer<F> {
    fetcher: F,
    layout: Layout,
    tracker: ChecksumTracker,
    archive: ArchiveStore,
}

impl<F: Fetcher> Synchronizer<F> {
    pub fn new(fetcher: F, layout: Layout) -> Self {
        Self {
            tracker: ChecksumTracker::new(layout.meta_path()),
            archive: ArchiveStore::new(layout.bin_dir.clone()),
            fetcher,
            layout,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn tracker(&self) -> &ChecksumTracker {
        &self.tracker
    }

    pub fn archive(&self) -> &ArchiveStore {
        &self.archive
    }

    /// Read the tracker and run one cycle under the sync lock.
    ///
    /// Dry runs take no lock and write nothing.
    pub fn run_once(&self, dry_run: bool) -> Result<CycleOutcome, SyncError> {
        let _lock = if dry_run {
            None
        } else {
            Some(SyncLock::acquire(&self.layout.lock_path())?)
        };
        let tracked = self.tracker.read_current()?;
        Ok(self.cycle(tracked.as_ref(), dry_run)?.outcome)
    }

    /// Run one cycle against the given tracker value.
    ///
    /// On success the returned report carries the value now persisted by the
    /// tracker (unchanged unless a new snapshot was committed).
    pub fn cycle(
        &self,
        tracked: Option<&SnapshotMeta>,
        dry_run: bool,
    ) -> Result<CycleReport, SyncError> {
        let mut phase = CyclePhase::Idle;
        let result = self.cycle_inner(tracked, dry_run, &mut phase);
        if let Err(err) = &result {
            tracing::error!(
                phase = %phase,
                tracked = tracked.map(|m| m.checksum.as_str()).unwrap_or("none"),
                error = %err,
                "sync cycle aborted",
            );
        }
        result
    }

    fn cycle_inner(
        &self,
        tracked: Option<&SnapshotMeta>,
        dry_run: bool,
        phase: &mut CyclePhase,
    ) -> Result<CycleReport, SyncError> {
        let previous = tracked.map(|meta| meta.checksum.clone());
        let www = &self.layout.www_dir;

        enter(phase, CyclePhase::Fetching);
        let snapshot = self.fetcher.fetch()?;

        if previous.as_ref() == Some(&snapshot.checksum) {
            enter(phase, CyclePhase::Unchanged);
            tracing::info!(checksum = %snapshot.checksum, "content is up to date");
            return Ok(CycleReport {
                outcome: CycleOutcome::Unchanged {
                    checksum: snapshot.checksum,
                },
                tracked: tracked.cloned(),
            });
        }

        tracing::info!(
            previous = previous.as_ref().map(Checksum::as_str).unwrap_or("none"),
            current = %snapshot.checksum,
            "content update detected",
        );
        let changes = plan_changes(tracked, &snapshot);
        let items = snapshot.items();

        if dry_run {
            return Ok(CycleReport {
                outcome: CycleOutcome::WouldUpdate {
                    previous,
                    current: snapshot.checksum.clone(),
                    writes: writer::plan_writes(www, &items),
                    changes,
                },
                tracked: tracked.cloned(),
            });
        }

        if let Some(previous) = &previous {
            self.archive.ensure_vacant(previous)?;
        }

        enter(phase, CyclePhase::Staging);
        let staged = writer::stage(&self.layout.staging_dir(), &items)?;
        log_changes(&changes);

        enter(phase, CyclePhase::Archiving);
        let archived = match &previous {
            Some(previous) => self.archive.archive(previous, www).map(|a| (Some(a), Vec::new())),
            None => writer::clear_untracked(www).map(|removed| (None, removed)),
        };
        let (archived, removed) = match archived {
            Ok(done) => done,
            Err(err) => {
                staged.discard();
                return Err(err);
            }
        };

        enter(phase, CyclePhase::Writing);
        let writes = writer::promote(staged, www)?;

        let meta = snapshot.meta(Utc::now());
        self.tracker.write_current(&meta)?;
        enter(phase, CyclePhase::Committed);
        tracing::info!(checksum = %meta.checksum, files = writes.len(), "update complete");

        Ok(CycleReport {
            outcome: CycleOutcome::Updated {
                previous,
                current: snapshot.checksum,
                archived,
                removed,
                writes,
                changes,
            },
            tracked: Some(meta),
        })
    }
}

fn enter(phase: &mut CyclePhase, next: CyclePhase) {
    tracing::debug!(from = %phase, to = %next, "cycle phase");
    *phase = next;
}
