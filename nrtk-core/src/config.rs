//! Runtime configuration.
//!
//! Settings come from three layers, highest precedence first:
//!
//! 1. command-line flags / environment variables (parsed by the CLI),
//! 2. an optional YAML file (`--config`),
//! 3. built-in defaults.
//!
//! Each layer is a [`ConfigLayer`]; [`ConfigLayer::or`] merges two of them and
//! [`SyncConfig::resolve`] validates the result.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::layout::Layout;

pub const DEFAULT_AUTH_SCHEME: &str = "Token";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Shortest accepted repeat interval.
pub const MIN_SYNC_INTERVAL_SECS: u64 = 60;

/// One partially-specified layer of configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub auth_scheme: Option<String>,
    pub timeout_secs: Option<u64>,
    pub base_dir: Option<PathBuf>,
    pub www_dir: Option<PathBuf>,
    pub bin_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub interval_secs: Option<u64>,
}

impl ConfigLayer {
    /// Load a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fill every unset field of `self` from `lower`.
    pub fn or(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            api_url: self.api_url.or(lower.api_url),
            api_token: self.api_token.or(lower.api_token),
            auth_scheme: self.auth_scheme.or(lower.auth_scheme),
            timeout_secs: self.timeout_secs.or(lower.timeout_secs),
            base_dir: self.base_dir.or(lower.base_dir),
            www_dir: self.www_dir.or(lower.www_dir),
            bin_dir: self.bin_dir.or(lower.bin_dir),
            log_level: self.log_level.or(lower.log_level),
            log_file: self.log_file.or(lower.log_file),
            interval_secs: self.interval_secs.or(lower.interval_secs),
        }
    }

    /// Store locations only; needs no credentials.
    pub fn layout(&self) -> Layout {
        let base = self
            .base_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let mut layout = Layout::from_base(&base);
        if let Some(www) = &self.www_dir {
            layout.www_dir = www.clone();
        }
        if let Some(bin) = &self.bin_dir {
            layout.bin_dir = bin.clone();
        }
        layout
    }

    /// Validated repeat interval. `None` or `0` means a single cycle.
    pub fn interval(&self) -> Result<Option<Duration>, ConfigError> {
        match self.interval_secs {
            None | Some(0) => Ok(None),
            Some(secs) if secs < MIN_SYNC_INTERVAL_SECS => Err(ConfigError::IntervalTooShort {
                secs,
                min: MIN_SYNC_INTERVAL_SECS,
            }),
            Some(secs) => Ok(Some(Duration::from_secs(secs))),
        }
    }
}

/// Fully resolved configuration for a sync process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub api_url: String,
    pub api_token: String,
    pub auth_scheme: String,
    pub timeout: Duration,
    pub layout: Layout,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub interval: Option<Duration>,
}

impl SyncConfig {
    /// Validate a merged layer.
    pub fn resolve(layer: ConfigLayer) -> Result<Self, ConfigError> {
        let api_url = required(layer.api_url.as_deref(), "api_url", "api-url", "NRTK_API_URL")?;
        let api_token = required(
            layer.api_token.as_deref(),
            "api_token",
            "api-token",
            "NRTK_API_TOKEN",
        )?;
        let auth_scheme = match layer.auth_scheme.as_deref().map(str::trim) {
            None => DEFAULT_AUTH_SCHEME.to_string(),
            Some("") => return Err(ConfigError::Empty("auth_scheme")),
            Some(scheme) => scheme.to_string(),
        };
        let timeout = Duration::from_secs(layer.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let interval = layer.interval()?;
        let layout = layer.layout();
        layout.validate()?;

        Ok(Self {
            api_url,
            api_token,
            auth_scheme,
            timeout,
            layout,
            log_level: layer.log_level,
            log_file: layer.log_file,
            interval,
        })
    }
}

fn required(
    value: Option<&str>,
    name: &'static str,
    flag: &'static str,
    env: &'static str,
) -> Result<String, ConfigError> {
    match value.map(str::trim) {
        None => Err(ConfigError::Missing { name, flag, env }),
        Some("") => Err(ConfigError::Empty(name)),
        Some(v) => Ok(v.to_string()),
    }
}
