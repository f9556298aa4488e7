//! Checksum tracker: the durable record of the last committed snapshot.
//!
//! Persists a [`SnapshotMeta`] JSON document at `<app_dir>/meta.json`.
//! Writes go to `meta.json.tmp`, are fsynced, then renamed over the live
//! file, so a reader sees either the old record or the new one.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use nrtk_core::{Checksum, SnapshotMeta};

use crate::error::{tracker_err, SyncError};

#[derive(Debug, Clone)]
pub struct ChecksumTracker {
    path: PathBuf,
}

impl ChecksumTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the committed record.
    ///
    /// Returns `None` if no cycle has ever committed.
    pub fn read_current(&self) -> Result<Option<SnapshotMeta>, SyncError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "meta file not found; treating as first run");
                return Ok(None);
            }
            Err(err) => return Err(tracker_err(&self.path, err)),
        };
        let meta = serde_json::from_str(&contents).map_err(|e| tracker_err(&self.path, e))?;
        Ok(Some(meta))
    }

    /// Checksum of the committed snapshot, if any.
    pub fn current_checksum(&self) -> Result<Option<Checksum>, SyncError> {
        Ok(self.read_current()?.map(|meta| meta.checksum))
    }

    /// Durably replace the committed record.
    pub fn write_current(&self, meta: &SnapshotMeta) -> Result<(), SyncError> {
        let Some(dir) = self.path.parent() else {
            return Err(tracker_err(&self.path, "invalid meta file path"));
        };
        fs::create_dir_all(dir).map_err(|e| tracker_err(dir, e))?;

        let json = serde_json::to_string_pretty(meta).map_err(|e| tracker_err(&self.path, e))?;
        let tmp = self.path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp);
            return Err(tracker_err(&tmp, e));
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(tracker_err(&self.path, e));
        }
        sync_dir(dir);
        tracing::debug!(checksum = %meta.checksum, path = %self.path.display(), "tracker updated");
        Ok(())
    }
}

/// Flush the directory entry of a rename. Best effort: not every platform
/// allows opening a directory for sync.
pub(crate) fn sync_dir(dir: &Path) {
    if cfg!(unix) {
        if let Ok(handle) = File::open(dir) {
            let _ = handle.sync_all();
        }
    }
}
