//! Size-based rotation for the sync log file.
//!
//! `sync.log` is rotated once it reaches 10 MiB, keeping at most 5 copies:
//!   sync.log → sync.log.1 → sync.log.2 → … → sync.log.5

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Maximum log file size before rotation (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum number of rotated backup files to keep.
pub const MAX_ROTATED_FILES: usize = 5;

/// Rotate `log_path` if its size exceeds `max_bytes`.
///
/// Rotation sequence (oldest first):
///   `<name>.<max_files>` deleted
///   `<name>.<n>` → `<name>.<n+1>` for n = max_files-1 … 1
///   `<name>` → `<name>.1`
///
/// Returns `true` if rotation occurred, `false` if the file was under the
/// threshold (or did not exist yet).
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };

    if size < max_bytes {
        return Ok(false);
    }

    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    for n in (1..max_files).rev() {
        let src = numbered_path(log_path, n);
        let dst = numbered_path(log_path, n + 1);
        if src.exists() {
            fs::rename(&src, &dst)?;
        }
    }

    fs::rename(log_path, numbered_path(log_path, 1))?;
    Ok(true)
}

/// Build the path for the `n`-th rotated copy of `base` (e.g. `sync.log.2`).
fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("sync.log");
    base.with_file_name(format!("{name}.{n}"))
}

// ---------------------------------------------------------------------------
// Rotating log file
// ---------------------------------------------------------------------------

/// Append-only log file that can be rotated while the subscriber holds it.
#[derive(Debug)]
pub struct RotatingLog {
    path: PathBuf,
    max_bytes: u64,
    max_files: usize,
    file: Mutex<File>,
}

impl RotatingLog {
    /// Rotate `path` if it is already oversized, then open it for appending.
    pub fn open(path: &Path, max_bytes: u64, max_files: usize) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        rotate_if_needed(path, max_bytes, max_files)?;
        Ok(Self {
            path: path.to_path_buf(),
            max_bytes,
            max_files,
            file: Mutex::new(append(path)?),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rotate if the live file has grown past the limit and reopen it.
    pub fn rotate(&self) -> io::Result<bool> {
        let mut file = self.file.lock().map_err(|_| poisoned())?;
        file.flush()?;
        if !rotate_if_needed(&self.path, self.max_bytes, self.max_files)? {
            return Ok(false);
        }
        *file = append(&self.path)?;
        Ok(true)
    }

    /// [`RotatingLog::rotate`], reporting the result through tracing.
    pub fn rotate_logged(&self) {
        match self.rotate() {
            Ok(true) => tracing::info!(path = %self.path.display(), "log file rotated"),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "log rotation failed")
            }
        }
    }
}

impl Write for &RotatingLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.lock().map_err(|_| poisoned())?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.lock().map_err(|_| poisoned())?.flush()
    }
}

fn append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "log file lock poisoned")
}

// ─── Tests ────────────────────────────────────────────────────────────────────
