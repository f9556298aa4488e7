//! Error types for nrtk-core.

use std::path::PathBuf;

use thiserror::Error;

/// A value that cannot be used as a single file or directory name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid name {value:?}: {reason}")]
pub struct NameError {
    pub value: String,
    pub reason: &'static str,
}

/// All errors that can arise while assembling the runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure while reading a config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, with file path and line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required setting was not provided by flag, environment or file.
    #[error("missing required setting `{name}` (flag --{flag} or env {env})")]
    Missing {
        name: &'static str,
        flag: &'static str,
        env: &'static str,
    },

    /// A setting was provided but is blank.
    #[error("setting `{0}` must not be empty")]
    Empty(&'static str),

    /// Repeat interval shorter than the minimum sync cycle.
    #[error("repeat interval {secs}s is shorter than the minimum of {min}s")]
    IntervalTooShort { secs: u64, min: u64 },

    /// A private store would be swept up by archival of the Content Store.
    #[error("{store} directory {path} must not be inside the content directory {www}")]
    NestedStore {
        store: &'static str,
        path: PathBuf,
        www: PathBuf,
    },
}
