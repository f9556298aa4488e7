//! Tracing subscriber setup.
//!
//! Logs always go to stderr. With a log file configured they are also
//! appended (without ANSI colours) to a [`RotatingLog`].

use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{io_err, DaemonError};
use crate::log_rotation::{RotatingLog, MAX_LOG_BYTES, MAX_ROTATED_FILES};

/// Map a user-supplied level onto an `EnvFilter` directive.
///
/// Accepts tracing level names, the legacy names `WARNING`, `CRITICAL` and
/// `FATAL`, and the numeric levels 10–50. Anything else is passed through as
/// a raw directive (e.g. `nrtk_sync=debug`).
pub fn filter_directive(level: &str) -> String {
    let level = level.trim();
    let mapped = match level.to_ascii_uppercase().as_str() {
        "CRITICAL" | "FATAL" | "50" | "ERROR" | "40" => "error",
        "WARNING" | "WARN" | "30" => "warn",
        "INFO" | "20" => "info",
        "DEBUG" | "10" => "debug",
        "TRACE" | "NOTSET" | "0" => "trace",
        _ => return level.to_string(),
    };
    mapped.to_string()
}

/// Explicit level wins; otherwise `RUST_LOG`, otherwise `info`.
pub fn build_filter(level: Option<&str>) -> Result<EnvFilter, DaemonError> {
    match level {
        Some(level) => {
            EnvFilter::try_new(filter_directive(level)).map_err(|e| DaemonError::LogLevel {
                level: level.to_string(),
                reason: e.to_string(),
            })
        }
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
    }
}

/// Install the global subscriber.
///
/// Returns the opened log file so long-running callers can rotate it. A
/// subscriber that is already installed (tests, embedding) is left alone.
pub fn init_tracing(
    level: Option<&str>,
    log_file: Option<&Path>,
) -> Result<Option<Arc<RotatingLog>>, DaemonError> {
    let filter = build_filter(level)?;
    let log = log_file
        .map(|path| {
            RotatingLog::open(path, MAX_LOG_BYTES, MAX_ROTATED_FILES)
                .map(Arc::new)
                .map_err(|e| io_err(path, e))
        })
        .transpose()?;

    let file_layer = log.clone().map(|log| {
        fmt::layer()
            .with_writer(log)
            .with_ansi(false)
            .with_target(false)
    });
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init();

    if let Some(log) = &log {
        tracing::debug!(path = %log.path().display(), "logging to file");
    }
    Ok(log)
}
