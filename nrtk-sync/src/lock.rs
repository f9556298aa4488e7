//! Advisory lock that keeps two sync processes off the same stores.
//!
//! Held for the whole cycle; released when the [`SyncLock`] is dropped. The
//! lock file itself is left in place, only the `flock` matters.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{io_err, SyncError};

#[derive(Debug)]
pub struct SyncLock {
    path: PathBuf,
    _file: File,
}

impl SyncLock {
    /// Take the lock without waiting.
    ///
    /// Returns [`SyncError::Locked`] if another process holds it.
    pub fn acquire(path: &Path) -> Result<Self, SyncError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| io_err(path, e))?;

        if !try_flock_exclusive(&file).map_err(|e| io_err(path, e))? {
            return Err(SyncError::Locked {
                path: path.to_path_buf(),
            });
        }
        tracing::debug!(path = %path.display(), "sync lock acquired");

        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> std::io::Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(errno) => Err(std::io::Error::from(errno)),
    }
}

#[cfg(not(unix))]
fn try_flock_exclusive(_file: &File) -> std::io::Result<bool> {
    Ok(true)
}
