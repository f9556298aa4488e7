//! # nrtk-sync
//!
//! Checksum-gated content synchronization for an NRTK instance.
//!
//! Build a [`Synchronizer`] from a [`Fetcher`] (usually an [`HttpFetcher`])
//! and a [`nrtk_core::Layout`], then call [`Synchronizer::run_once`] or drive
//! [`Synchronizer::cycle`] from a scheduler.

pub mod archive;
pub mod error;
pub mod fetcher;
pub mod lock;
pub mod plan;
pub mod sitemap;
pub mod synchronizer;
pub mod tracker;
pub mod writer;

pub use archive::{ArchiveStore, ArchivedSnapshot};
pub use error::{FetchError, SyncError};
pub use fetcher::{Fetcher, HttpFetcher};
pub use plan::ChangeSet;
pub use synchronizer::{CycleOutcome, CyclePhase, CycleReport, Synchronizer};
pub use tracker::ChecksumTracker;
pub use writer::WriteResult;
