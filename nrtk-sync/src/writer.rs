//! Content Store writer.
//!
//! A cycle never writes straight into the Content Store. New content goes
//! through two steps:
//!
//! 1. **stage**: every item is written and fsynced into a fresh staging
//!    directory next to the Content Store (see `Layout::staging_dir`).
//! 2. **promote**: once the old snapshot has been archived, each staged file
//!    is moved into the Content Store.
//!
//! A failure while staging leaves the Content Store untouched. Moves fall
//! back to copy and remove when source and target are on different
//! filesystems.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use nrtk_core::ContentItem;

use crate::error::{io_err, write_err, SyncError};
use crate::tracker::sync_dir;

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of publishing an individual file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was published into the Content Store.
    Written { path: PathBuf },
    /// `--dry-run` mode: the file *would* have been published.
    WouldWrite { path: PathBuf },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path } | WriteResult::WouldWrite { path } => path,
        }
    }
}

// ---------------------------------------------------------------------------
// Moving entries
// ---------------------------------------------------------------------------

/// Rename `from` to `to`. When the two sit on different filesystems the
/// entry is copied, fsynced, and the source removed.
///
/// On error `from` is left in place and no partial `to` remains.
pub(crate) fn move_entry(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if crosses_devices(&e) => {
            tracing::debug!(from = %from.display(), to = %to.display(), "crossing filesystems; copying");
            copy_then_remove(from, to)
        }
        other => other,
    }
}

#[cfg(unix)]
fn crosses_devices(err: &io::Error) -> bool {
    err.raw_os_error() == Some(nix::errno::Errno::EXDEV as i32)
}

#[cfg(not(unix))]
fn crosses_devices(_err: &io::Error) -> bool {
    false
}

fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    if fs::symlink_metadata(to).is_ok() {
        return Err(io::Error::new(ErrorKind::AlreadyExists, "move target already exists"));
    }
    if let Err(e) = copy_tree(from, to) {
        let _ = remove_path(to);
        return Err(e);
    }
    remove_path(from)
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(from)?;
    if meta.is_dir() {
        fs::create_dir(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_tree(&entry.path(), &to.join(entry.file_name()))?;
        }
        sync_dir(to);
    } else if meta.file_type().is_symlink() {
        copy_symlink(from, to)?;
    } else {
        fs::copy(from, to)?;
        File::open(to)?.sync_all()?;
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(from)?, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

fn remove_path(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

/// New content fully written to the staging area, waiting for promotion.
#[derive(Debug)]
pub struct StagedSnapshot {
    dir: PathBuf,
    names: Vec<String>,
}

impl StagedSnapshot {
    /// Drop the staged files (cycle aborted before promotion).
    pub fn discard(self) {
        if let Err(err) = fs::remove_dir_all(&self.dir) {
            tracing::warn!(path = %self.dir.display(), error = %err, "failed to discard staging area");
        }
    }
}

/// Write every item into a fresh staging directory.
///
/// Leftovers from an aborted cycle are removed first. The directory is
/// private to the cycle, so each file is written in place.
pub fn stage(staging_dir: &Path, items: &[ContentItem]) -> Result<StagedSnapshot, SyncError> {
    match fs::remove_dir_all(staging_dir) {
        Ok(()) => tracing::warn!(path = %staging_dir.display(), "removed leftover staging area"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(write_err(staging_dir, e)),
    }
    fs::create_dir_all(staging_dir).map_err(|e| write_err(staging_dir, e))?;

    let mut names = Vec::with_capacity(items.len());
    for item in items {
        let path = staging_dir.join(&item.name);
        write_synced(&path, &item.body)?;
        tracing::debug!(name = %item.name, kind = %item.kind, "staged");
        names.push(item.name.clone());
    }
    sync_dir(staging_dir);

    Ok(StagedSnapshot {
        dir: staging_dir.to_path_buf(),
        names,
    })
}

fn write_synced(path: &Path, content: &str) -> Result<(), SyncError> {
    let write = || -> io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()
    };
    write().map_err(|e| write_err(path, e))
}

/// Move staged files into the Content Store and remove the staging area.
///
/// On failure the staging area is kept: it holds the only copy of the new
/// snapshot's remaining files.
pub fn promote(staged: StagedSnapshot, www_dir: &Path) -> Result<Vec<WriteResult>, SyncError> {
    fs::create_dir_all(www_dir).map_err(|e| write_err(www_dir, e))?;

    let mut writes = Vec::with_capacity(staged.names.len());
    for name in &staged.names {
        let from = staged.dir.join(name);
        let to = www_dir.join(name);
        move_entry(&from, &to).map_err(|e| write_err(&to, e))?;
        tracing::info!(path = %to.display(), "wrote");
        writes.push(WriteResult::Written { path: to });
    }
    sync_dir(www_dir);

    fs::remove_dir_all(&staged.dir).map_err(|e| io_err(&staged.dir, e))?;
    Ok(writes)
}

/// What [`promote`] would report, without touching the filesystem.
pub fn plan_writes(www_dir: &Path, items: &[ContentItem]) -> Vec<WriteResult> {
    items
        .iter()
        .map(|item| WriteResult::WouldWrite {
            path: www_dir.join(&item.name),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Content Store inspection
// ---------------------------------------------------------------------------

/// Sorted names of every entry directly under `dir`. A missing directory is
/// treated as empty.
pub fn list_entries(dir: &Path) -> Result<Vec<String>, SyncError> {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(dir, e)),
    };
    let mut names = Vec::new();
    for entry in read {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Remove everything in the Content Store. Used on the first run, when
/// nothing is tracked and therefore nothing can be archived.
pub fn clear_untracked(www_dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let mut removed = Vec::new();
    for name in list_entries(www_dir)? {
        let path = www_dir.join(&name);
        tracing::warn!(path = %path.display(), "removing untracked file");
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|e| write_err(&path, e))?;
        removed.push(path);
    }
    Ok(removed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
