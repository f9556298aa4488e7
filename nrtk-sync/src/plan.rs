//! Story-level change report between the committed snapshot and a fetched one.
//!
//! Checksums decide *whether* a cycle publishes; this module only explains
//! *what* changed, using the per-story `hash` the API sends. It backs
//! `--dry-run` output and the per-story log lines of a real cycle.

use serde::Serialize;

use nrtk_core::layout::INDEX_FILE;
use nrtk_core::{Snapshot, SnapshotMeta, StoryMeta};

/// Content Store file names grouped by what a cycle does to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Compare the stories of `next` with those recorded in `previous`.
pub fn plan_changes(previous: Option<&SnapshotMeta>, next: &Snapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();
    let incoming = next.meta(chrono::Utc::now()).stories;

    for (file, story) in &incoming {
        match previous.and_then(|p| p.stories.get(file)) {
            None => changes.added.push(file.clone()),
            Some(old) if differs(old, story) => changes.updated.push(file.clone()),
            Some(_) => changes.unchanged.push(file.clone()),
        }
    }
    if let Some(previous) = previous {
        changes.removed = previous
            .stories
            .keys()
            .filter(|file| !incoming.contains_key(*file))
            .cloned()
            .collect();
    }
    changes
}

fn differs(old: &StoryMeta, new: &StoryMeta) -> bool {
    old.hash != new.hash || old.anchor != new.anchor
}

/// Emit one log line per touched story.
pub fn log_changes(changes: &ChangeSet) {
    for file in &changes.added {
        tracing::info!(page = %file, "saving new page");
    }
    for file in &changes.updated {
        let label = if file == INDEX_FILE { "landing page" } else { "page" };
        tracing::warn!(page = %file, "updating {label}; old version goes to the snapshot");
    }
    for file in &changes.removed {
        tracing::warn!(page = %file, "page was removed; moving it into the snapshot");
    }
}
