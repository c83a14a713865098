//! Result items and canonical URL identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string into a result identity key.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase scheme and host, drop default ports and credentials
/// 4. Remove fragment (#...)
/// 5. Strip trailing slashes from the path (the bare root becomes empty)
/// 6. Keep query string intact (do not reorder)
pub fn canonical_url(input: &str) -> Result<String, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| UrlError::InvalidUrl(format!("missing host: {trimmed}")))?
        .to_lowercase();

    let mut canonical = format!("{}://{}", parsed.scheme(), host);
    if let Some(port) = parsed.port() {
        canonical.push_str(&format!(":{port}"));
    }
    canonical.push_str(parsed.path().trim_end_matches('/'));
    if let Some(query) = parsed.query() {
        canonical.push('?');
        canonical.push_str(query);
    }

    Ok(canonical)
}

/// One search result from one source.
///
/// Identity is `canonical_url`; two items with the same canonical URL are the
/// same entity no matter how the source formatted the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultItem {
    pub canonical_url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub source_id: String,
}

impl ResultItem {
    /// Build an item, canonicalizing `url`.
    pub fn new(source_id: impl Into<String>, url: &str, title: impl Into<String>) -> Result<Self, UrlError> {
        Ok(Self {
            canonical_url: canonical_url(url)?,
            title: title.into(),
            thumbnail: None,
            author: None,
            published_at: None,
            source_id: source_id.into(),
        })
    }

    pub fn with_thumbnail(mut self, thumbnail: Option<String>) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    pub fn with_published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at;
        self
    }
}
