//! nrtk core library: snapshot types, on-disk layout, configuration.
//!
//! - [`types`]: checksums, snapshots, tracker records
//! - [`layout`]: where each store lives under the base directory
//! - [`config`]: merged flag / environment / YAML configuration
//! - [`error`]: [`ConfigError`], [`NameError`]

pub mod config;
pub mod error;
pub mod layout;
pub mod types;

pub use config::{ConfigLayer, SyncConfig};
pub use error::{ConfigError, NameError};
pub use layout::Layout;
pub use types::{
    Article, Checksum, ContentItem, ItemKind, SiteInfo, Snapshot, SnapshotMeta, StoryMeta,
};
