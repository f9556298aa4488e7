//! Error types for nrtk-sync.

use std::path::PathBuf;

use thiserror::Error;

use nrtk_core::{Checksum, NameError};

/// Failure to obtain a usable snapshot from the API. Raised before any
/// filesystem work, so local state is never affected.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL or token is blank.
    #[error("fetcher setting `{0}` must not be empty")]
    MissingSetting(&'static str),

    /// The API answered with a non-success status.
    #[error("HTTP {code} from {url}")]
    Status { url: String, code: u16 },

    /// Connection, TLS or timeout failure.
    #[error("failed to fetch {url}: {message}")]
    Transport { url: String, message: String },

    /// The response body could not be read.
    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// The body is not JSON.
    #[error("bad API response, JSON expected: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON that does not satisfy the response contract.
    #[error("invalid API response: {0}")]
    Malformed(String),

    /// An anchor or checksum that cannot be used as a file name.
    #[error("invalid API response: {0}")]
    InvalidName(#[from] NameError),
}

/// All errors that can arise from a sync cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The archive directory for the outgoing snapshot already exists.
    #[error("archive for snapshot {checksum} already exists at {path}; manual reconciliation required")]
    ArchiveConflict { checksum: Checksum, path: PathBuf },

    /// Archiving failed after some files were already moved.
    #[error("archiving snapshot {checksum} into {path} stopped part-way: {source}; manual reconciliation required")]
    ArchiveIncomplete {
        checksum: Checksum,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Staging or publishing a content file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The checksum tracker could not be read or written.
    #[error("checksum tracker at {path} is unusable: {reason}")]
    Tracker { path: PathBuf, reason: String },

    /// Another process holds the sync lock.
    #[error("another sync is in progress (lock held: {path})")]
    Locked { path: PathBuf },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::Write`].
pub(crate) fn write_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Write {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::Tracker`].
pub(crate) fn tracker_err(path: impl Into<PathBuf>, reason: impl ToString) -> SyncError {
    SyncError::Tracker {
        path: path.into(),
        reason: reason.to_string(),
    }
}
