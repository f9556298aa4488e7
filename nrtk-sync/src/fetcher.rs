//! Fetcher: one API call per cycle, returning a validated [`Snapshot`].
//!
//! The NRTK API answers with a JSON document describing the whole site:
//!
//! ```json
//! {
//!   "title": "...", "entity": "...", "homepage_url": "...",
//!   "error_page": "<html>...",
//!   "stories": [
//!     { "anchor": "a1", "content": "...", "is_landing": false, "hash": "...",
//!       "canonical_url": "...", "updated_at": "...", "title": "...",
//!       "uid": "...", "credits": [...] }
//!   ],
//!   "checksum": "optional"
//! }
//! ```
//!
//! When the response carries no `checksum`, the snapshot checksum is the
//! SHA-256 of the response re-serialized with sorted keys.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use nrtk_core::layout::RESERVED_NAMES;
use nrtk_core::types::check_path_component;
use nrtk_core::{Article, Checksum, SiteInfo, Snapshot};

use crate::error::FetchError;
use crate::sitemap;

/// Source of snapshots for the synchronizer.
pub trait Fetcher {
    fn fetch(&self) -> Result<Snapshot, FetchError>;
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    fn fetch(&self) -> Result<Snapshot, FetchError> {
        (**self).fetch()
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse {
    homepage_url: String,
    stories: Vec<ApiStory>,
    error_page: String,
    entity: Value,
    title: String,
    #[serde(default)]
    checksum: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiStory {
    canonical_url: String,
    content: String,
    anchor: String,
    updated_at: String,
    is_landing: bool,
    hash: String,
    #[serde(rename = "title")]
    _title: IgnoredAny,
    #[serde(rename = "uid")]
    _uid: IgnoredAny,
    #[serde(rename = "credits")]
    _credits: IgnoredAny,
}

impl From<ApiStory> for Article {
    fn from(story: ApiStory) -> Self {
        Article {
            anchor: story.anchor,
            body: story.content,
            hash: story.hash,
            canonical_url: story.canonical_url,
            updated_at: story.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Validate a raw response body and turn it into a [`Snapshot`].
pub fn parse_response(body: &str) -> Result<Snapshot, FetchError> {
    let raw: Value = serde_json::from_str(body)?;
    if !raw.is_object() {
        return Err(FetchError::Malformed("top-level JSON object expected".into()));
    }

    let checksum = match raw.get("checksum").and_then(Value::as_str) {
        Some(upstream) => Checksum::parse(upstream)?,
        None => Checksum::parse(compute_checksum(&raw))?,
    };

    let response: ApiResponse =
        serde_json::from_value(raw).map_err(|e| FetchError::Malformed(e.to_string()))?;
    let ApiResponse {
        homepage_url,
        stories,
        error_page,
        entity,
        title,
        checksum: _,
    } = response;

    if stories.is_empty() {
        tracing::warn!(checksum = %checksum, "no stories received; instance content will be emptied");
    }

    let mut landing: Option<Article> = None;
    let mut articles = BTreeMap::new();
    for story in stories {
        check_path_component(&story.anchor)?;
        if story.is_landing && landing.is_none() {
            landing = Some(story.into());
            continue;
        }
        if RESERVED_NAMES.contains(&story.anchor.as_str()) {
            return Err(FetchError::Malformed(format!(
                "story anchor `{}` collides with a reserved file name",
                story.anchor
            )));
        }
        let article = Article::from(story);
        if articles.contains_key(&article.anchor) {
            return Err(FetchError::Malformed(format!(
                "duplicate story anchor `{}`",
                article.anchor
            )));
        }
        articles.insert(article.anchor.clone(), article);
    }

    let listed: Vec<&Article> = articles.values().collect();
    let sitemap = sitemap::render(landing.as_ref(), &listed);

    Ok(Snapshot {
        checksum,
        site: SiteInfo {
            title,
            entity,
            homepage_url,
        },
        landing,
        error_page,
        articles,
        sitemap,
    })
}

/// Lowercase hex SHA-256 of `value` serialized with object keys sorted.
///
/// The bytes hashed are those of Python's `json.dumps(value, sort_keys=True)`:
/// `", "` and `": "` separators, and every character outside printable ASCII
/// escaped as `\uXXXX`. Legacy `meta.json` records keep matching.
pub fn compute_checksum(value: &Value) -> String {
    let mut canonical = String::new();
    push_canonical(value, &mut canonical);
    let mut h = Sha256::new();
    h.update(canonical.as_bytes());
    hex::encode(h.finalize())
}

fn push_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                push_ascii_string(key, out);
                out.push_str(": ");
                push_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                push_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => push_ascii_string(s, out),
        other => out.push_str(&other.to_string()),
    }
}

fn push_ascii_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(ch),
            _ => {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{unit:04x}"));
                }
            }
        }
    }
    out.push('"');
}

// ---------------------------------------------------------------------------
// HTTP fetcher
// ---------------------------------------------------------------------------

/// Fetches the instance document over HTTP(S) with `ureq`.
pub struct HttpFetcher {
    agent: ureq::Agent,
    api_url: String,
    authorization: String,
}

impl HttpFetcher {
    /// `auth_scheme` is the word before the token in the `Authorization`
    /// header (`Token` for the NRTK API).
    pub fn new(
        api_url: &str,
        api_token: &str,
        auth_scheme: &str,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        if api_url.trim().is_empty() {
            return Err(FetchError::MissingSetting("api_url"));
        }
        if api_token.trim().is_empty() {
            return Err(FetchError::MissingSetting("api_token"));
        }
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(&format!("nrtk-sync/{}", env!("CARGO_PKG_VERSION")))
            .build();
        Ok(Self {
            agent,
            api_url: api_url.trim().to_string(),
            authorization: format!("{} {}", auth_scheme.trim(), api_token.trim()),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self) -> Result<Snapshot, FetchError> {
        tracing::debug!(url = %self.api_url, "requesting instance content");
        let response = match self
            .agent
            .get(&self.api_url)
            .set("Authorization", &self.authorization)
            .set("Accept", "application/json")
            .call()
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                return Err(FetchError::Status {
                    url: self.api_url.clone(),
                    code,
                })
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(FetchError::Transport {
                    url: self.api_url.clone(),
                    message: transport.to_string(),
                })
            }
        };

        let body = response.into_string().map_err(|source| FetchError::Body {
            url: self.api_url.clone(),
            source,
        })?;
        parse_response(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
