//! On-disk layout of a synced instance.
//!
//! ```text
//! <base>/
//!   www/                  Content Store
//!   .nrtk/
//!     meta.json           checksum tracker record
//!     bin/<checksum>/     archived snapshots
//!     sync.lock           advisory lock held during a cycle
//!     sync.log            optional log file
//!   .www.nrtk-staging/    transient staging area, next to the Content Store
//! ```

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const APP_DIR: &str = ".nrtk";
pub const WWW_DIR: &str = "www";
pub const BIN_DIR: &str = "bin";
pub const STAGING_SUFFIX: &str = "nrtk-staging";
pub const META_FILE: &str = "meta.json";
pub const LOCK_FILE: &str = "sync.lock";
pub const LOG_FILE: &str = "sync.log";

pub const INDEX_FILE: &str = "index";
pub const ERROR_PAGE_FILE: &str = "error.html";
pub const SITEMAP_FILE: &str = "sitemap.xml";

/// File names that only the synchronizer itself may place in the Content Store.
pub const RESERVED_NAMES: [&str; 3] = [INDEX_FILE, ERROR_PAGE_FILE, SITEMAP_FILE];

/// Resolved locations of every store used by a sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub www_dir: PathBuf,
    pub app_dir: PathBuf,
    pub bin_dir: PathBuf,
}

impl Layout {
    /// Default layout rooted at `base`.
    pub fn from_base(base: &Path) -> Self {
        let app_dir = base.join(APP_DIR);
        Self {
            www_dir: base.join(WWW_DIR),
            bin_dir: app_dir.join(BIN_DIR),
            app_dir,
        }
    }

    pub fn meta_path(&self) -> PathBuf {
        self.app_dir.join(META_FILE)
    }

    /// `.<www name>.nrtk-staging` beside the Content Store, so promotion is
    /// a rename within one filesystem even when `www_dir` is overridden.
    pub fn staging_dir(&self) -> PathBuf {
        let www_name = self
            .www_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| WWW_DIR.to_string());
        let name = format!(".{www_name}.{STAGING_SUFFIX}");
        match self.www_dir.parent() {
            Some(parent) => parent.join(name),
            None => PathBuf::from(name),
        }
    }

    pub fn lock_path(&self) -> PathBuf {
        self.app_dir.join(LOCK_FILE)
    }

    pub fn default_log_path(&self) -> PathBuf {
        self.app_dir.join(LOG_FILE)
    }

    /// `bin/<checksum>/`
    pub fn archive_dir(&self, checksum: &str) -> PathBuf {
        self.bin_dir.join(checksum)
    }

    /// Archival moves every entry of the Content Store, so neither the
    /// archive nor the app directory may live inside it. Paths are compared
    /// lexically.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (store, path) in [("bin", &self.bin_dir), ("app", &self.app_dir)] {
            if path.starts_with(&self.www_dir) {
                return Err(ConfigError::NestedStore {
                    store,
                    path: path.clone(),
                    www: self.www_dir.clone(),
                });
            }
        }
        Ok(())
    }
}
