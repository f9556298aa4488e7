use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the scheduler runtime and its logging setup.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] nrtk_core::ConfigError),

    #[error("fetcher setup failed: {0}")]
    Fetch(#[from] nrtk_sync::FetchError),

    #[error("sync error: {0}")]
    Sync(#[from] nrtk_sync::SyncError),

    #[error("invalid log level `{level}`: {reason}")]
    LogLevel { level: String, reason: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
