//! Domain types for NRTK content snapshots.
//!
//! A [`Snapshot`] is one complete, checksum-identified state of the published
//! site. [`SnapshotMeta`] is the reduced record persisted by the checksum
//! tracker after a snapshot has been committed to disk.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NameError;
use crate::layout::{ERROR_PAGE_FILE, INDEX_FILE, SITEMAP_FILE};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque version identifier of a snapshot, as supplied (or derived) from
/// the API response. Never verified against content.
///
/// Checksums double as archive directory names, so only values that form a
/// single safe path component can be constructed through [`Checksum::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum(String);

impl Checksum {
    pub fn parse(value: impl Into<String>) -> Result<Self, NameError> {
        let value = value.into();
        check_path_component(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for Checksum {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.0
    }
}

impl AsRef<str> for Checksum {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ensure `value` can be used as a single file or directory name inside a
/// store root.
pub fn check_path_component(value: &str) -> Result<(), NameError> {
    let reason = if value.is_empty() {
        "empty"
    } else if value == "." || value == ".." {
        "relative path segment"
    } else if value.contains('/') || value.contains('\\') {
        "contains a path separator"
    } else if value.contains('\0') {
        "contains a NUL byte"
    } else {
        return Ok(());
    };
    Err(NameError {
        value: value.to_owned(),
        reason,
    })
}

// ---------------------------------------------------------------------------
// Content items
// ---------------------------------------------------------------------------

/// What role a file plays in the Content Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Article,
    Landing,
    ErrorPage,
    Sitemap,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Article => write!(f, "article"),
            ItemKind::Landing => write!(f, "landing"),
            ItemKind::ErrorPage => write!(f, "error page"),
            ItemKind::Sitemap => write!(f, "sitemap"),
        }
    }
}

/// One named file of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub name: String,
    pub kind: ItemKind,
    pub body: String,
}

/// A story published by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// File name in the Content Store.
    pub anchor: String,
    pub body: String,
    /// Upstream per-story content hash; used for change reporting only.
    pub hash: String,
    pub canonical_url: String,
    pub updated_at: String,
}

/// Site-level information attached to every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteInfo {
    pub title: String,
    pub entity: serde_json::Value,
    pub homepage_url: String,
}

/// A complete checksum-identified state of the site.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub checksum: Checksum,
    pub site: SiteInfo,
    /// Story flagged as the landing page; stored as `index`.
    pub landing: Option<Article>,
    pub error_page: String,
    /// Remaining stories keyed by anchor.
    pub articles: BTreeMap<String, Article>,
    /// Rendered `sitemap.xml`.
    pub sitemap: String,
}

impl Snapshot {
    /// Every file that makes up this snapshot in the Content Store.
    pub fn items(&self) -> Vec<ContentItem> {
        let mut items: Vec<ContentItem> = self
            .articles
            .values()
            .map(|article| ContentItem {
                name: article.anchor.clone(),
                kind: ItemKind::Article,
                body: article.body.clone(),
            })
            .collect();
        if let Some(landing) = &self.landing {
            items.push(ContentItem {
                name: INDEX_FILE.to_string(),
                kind: ItemKind::Landing,
                body: landing.body.clone(),
            });
        }
        items.push(ContentItem {
            name: ERROR_PAGE_FILE.to_string(),
            kind: ItemKind::ErrorPage,
            body: self.error_page.clone(),
        });
        items.push(ContentItem {
            name: SITEMAP_FILE.to_string(),
            kind: ItemKind::Sitemap,
            body: self.sitemap.clone(),
        });
        items
    }

    /// Build the tracker record committed after this snapshot is written.
    pub fn meta(&self, synced_at: DateTime<Utc>) -> SnapshotMeta {
        let landing = self
            .landing
            .iter()
            .map(|article| (INDEX_FILE.to_string(), StoryMeta::from(article)));
        let articles = self
            .articles
            .iter()
            .map(|(anchor, article)| (anchor.clone(), StoryMeta::from(article)));
        let stories = landing.chain(articles).collect();
        SnapshotMeta {
            checksum: self.checksum.clone(),
            title: self.site.title.clone(),
            entity: self.site.entity.clone(),
            homepage_url: self.site.homepage_url.clone(),
            synced_at: Some(synced_at),
            stories,
        }
    }
}

// ---------------------------------------------------------------------------
// Tracker record
// ---------------------------------------------------------------------------

/// Per-story metadata kept in `meta.json`, keyed by Content Store file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryMeta {
    pub anchor: String,
    pub hash: String,
    pub canonical_url: String,
    pub updated_at: String,
}

impl From<&Article> for StoryMeta {
    fn from(article: &Article) -> Self {
        Self {
            anchor: article.anchor.clone(),
            hash: article.hash.clone(),
            canonical_url: article.canonical_url.clone(),
            updated_at: article.updated_at.clone(),
        }
    }
}

/// The committed state: checksum of the snapshot currently in the Content
/// Store plus the metadata needed for reporting.
///
/// Unknown fields are ignored so that records written by older releases
/// (which carry a free-form `updated_at` string) still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub checksum: Checksum,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub entity: serde_json::Value,
    #[serde(default)]
    pub homepage_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stories: BTreeMap<String, StoryMeta>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
