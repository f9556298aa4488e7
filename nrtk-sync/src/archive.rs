//! Archive Store: superseded snapshots, one directory per checksum.
//!
//! Archival is a move: after [`ArchiveStore::archive`] the Content Store is
//! empty and `bin/<checksum>/` holds exactly what was published. An archive
//! directory is created once and never written again. If the first move
//! fails the empty directory is removed again; a failure after that is
//! [`SyncError::ArchiveIncomplete`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use nrtk_core::Checksum;

use crate::error::{io_err, SyncError};
use crate::tracker::sync_dir;
use crate::writer::{list_entries, move_entry};

/// A snapshot that has been moved out of the Content Store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedSnapshot {
    pub checksum: String,
    pub path: PathBuf,
    pub items: Vec<String>,
    /// Directory modification time, if the platform reports one.
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `bin/<checksum>/`
    pub fn snapshot_dir(&self, checksum: &Checksum) -> PathBuf {
        self.root.join(checksum.as_str())
    }

    /// Fail with [`SyncError::ArchiveConflict`] if `checksum` was archived
    /// before. Called ahead of any mutation so a conflict aborts the cycle
    /// cleanly.
    pub fn ensure_vacant(&self, checksum: &Checksum) -> Result<(), SyncError> {
        let dir = self.snapshot_dir(checksum);
        match fs::symlink_metadata(&dir) {
            Ok(_) => Err(SyncError::ArchiveConflict {
                checksum: checksum.clone(),
                path: dir,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(dir, e)),
        }
    }

    /// Move every entry of `content_dir` into a new `bin/<checksum>/`.
    pub fn archive(
        &self,
        checksum: &Checksum,
        content_dir: &Path,
    ) -> Result<ArchivedSnapshot, SyncError> {
        fs::create_dir_all(&self.root).map_err(|e| io_err(&self.root, e))?;

        let dir = self.snapshot_dir(checksum);
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(SyncError::ArchiveConflict {
                    checksum: checksum.clone(),
                    path: dir,
                })
            }
            Err(e) => return Err(io_err(dir, e)),
        }
        tracing::info!(checksum = %checksum, path = %dir.display(), "creating snapshot");

        let names = match list_entries(content_dir) {
            Ok(names) => names,
            Err(err) => {
                self.release_empty(&dir);
                return Err(err);
            }
        };

        for (moved, name) in names.iter().enumerate() {
            let from = content_dir.join(name);
            let to = dir.join(name);
            if let Err(source) = move_entry(&from, &to) {
                if moved == 0 {
                    self.release_empty(&dir);
                    return Err(io_err(from, source));
                }
                tracing::error!(
                    checksum = %checksum,
                    from = %from.display(),
                    to = %to.display(),
                    moved,
                    error = %source,
                    "archive move failed part-way",
                );
                return Err(SyncError::ArchiveIncomplete {
                    checksum: checksum.clone(),
                    path: dir,
                    source,
                });
            }
            tracing::debug!(from = %from.display(), to = %to.display(), "archived");
        }
        sync_dir(&dir);
        sync_dir(content_dir);

        Ok(ArchivedSnapshot {
            checksum: checksum.to_string(),
            archived_at: modified_at(&dir),
            path: dir,
            items: names,
        })
    }

    /// Remove an archive directory nothing was moved into, so the next
    /// cycle does not see a conflict.
    fn release_empty(&self, dir: &Path) {
        if let Err(err) = fs::remove_dir(dir) {
            tracing::warn!(path = %dir.display(), error = %err, "failed to remove empty archive directory");
        }
    }

    /// Every archived snapshot, oldest first.
    pub fn list(&self) -> Result<Vec<ArchivedSnapshot>, SyncError> {
        let mut snapshots = Vec::new();
        for name in list_entries(&self.root)? {
            let path = self.root.join(&name);
            if !path.is_dir() {
                continue;
            }
            snapshots.push(ArchivedSnapshot {
                checksum: name,
                items: list_entries(&path)?,
                archived_at: modified_at(&path),
                path,
            });
        }
        snapshots.sort_by(|a, b| {
            a.archived_at
                .cmp(&b.archived_at)
                .then_with(|| a.checksum.cmp(&b.checksum))
        });
        Ok(snapshots)
    }
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}
