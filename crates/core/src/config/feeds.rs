//! Declarative JSON feed sources.
//!
//! A feed is any HTTP endpoint that answers a GET with a JSON document holding
//! an array of results plus a pagination hint. Fields are located with JSON
//! pointers (RFC 6901), so most APIs can be wired up from the config file
//! without code.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a feed pages through results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum PaginationStyle {
    /// Numbered pages; `offset_param`, when set, also carries the running item offset.
    PageOffset {
        #[serde(default = "default_page_param")]
        page_param: String,
        #[serde(default)]
        offset_param: Option<String>,
        #[serde(default = "default_first_page")]
        first_page: u32,
    },
    /// Next-page token found at `next_pointer`, sent back as `param`.
    Token { param: String, next_pointer: String },
    /// Opaque cursor found at `next_pointer`, sent back as `param`.
    Cursor { param: String, next_pointer: String },
    /// Results older than the last seen id; the id is read from each item at `id_pointer`.
    Watermark {
        param: String,
        #[serde(default = "default_id_pointer")]
        id_pointer: String,
    },
}

/// JSON pointers into one result object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMap {
    #[serde(default = "default_url_pointer")]
    pub url: String,
    #[serde(default = "default_title_pointer")]
    pub title: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub published_at: Option<String>,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            url: default_url_pointer(),
            title: default_title_pointer(),
            thumbnail: None,
            author: None,
            published_at: None,
        }
    }
}

/// One configured feed source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Source id; also the lane name.
    pub id: String,

    /// Base URL of the search endpoint.
    pub endpoint: String,

    #[serde(default = "default_query_param")]
    pub query_param: String,

    pub pagination: PaginationStyle,

    /// Pointer to the results array.
    #[serde(default = "default_items_pointer")]
    pub items_pointer: String,

    #[serde(default)]
    pub fields: FieldMap,

    /// Pointer to a boolean "more results" flag, when the feed reports one.
    #[serde(default)]
    pub has_more_pointer: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable to read the API key from when `api_key` is unset.
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    /// Overrides the global timeout for this feed.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub strips_hashtag: bool,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_page_param() -> String {
    "page".into()
}

fn default_first_page() -> u32 {
    1
}

fn default_id_pointer() -> String {
    "/id".into()
}

fn default_url_pointer() -> String {
    "/url".into()
}

fn default_title_pointer() -> String {
    "/title".into()
}

fn default_query_param() -> String {
    "q".into()
}

fn default_items_pointer() -> String {
    "/items".into()
}

fn default_api_key_header() -> String {
    "X-Api-Key".into()
}

fn default_true() -> bool {
    true
}

impl FeedConfig {
    /// Whether the feed declares a credential at all.
    pub fn needs_api_key(&self) -> bool {
        self.api_key.is_some() || self.api_key_env.is_some()
    }

    /// The API key, from config or from `api_key_env`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| self.api_key_env.as_deref().and_then(|var| std::env::var(var).ok()))
            .filter(|key| !key.trim().is_empty())
    }

    pub fn timeout(&self, fallback: Duration) -> Duration {
        self.timeout_ms.map(Duration::from_millis).unwrap_or(fallback)
    }
}
