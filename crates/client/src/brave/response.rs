//! Brave Search API response types and normalization.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use trawl_core::ResultItem;

/// Raw response from the Brave Web Search API.
#[derive(Debug, Deserialize)]
pub struct BraveApiResponse {
    pub query: QueryInfo,
    #[serde(default)]
    pub web: Option<WebResults>,
}

#[derive(Debug, Deserialize)]
pub struct QueryInfo {
    pub original: String,
    #[serde(default)]
    #[serde(alias = "moreResultsAvailable")]
    pub more_results_available: bool,
}

#[derive(Debug, Deserialize)]
pub struct WebResults {
    pub results: Vec<WebResult>,
}

/// One web result as Brave returns it.
#[derive(Debug, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub thumbnail: Option<Thumbnail>,
    #[serde(default)]
    pub profile: Option<Profile>,
    /// Publication time, usually `YYYY-MM-DDTHH:MM:SS` without an offset.
    #[serde(default)]
    pub page_age: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Thumbnail {
    pub src: String,
}

#[derive(Debug, Deserialize)]
pub struct Profile {
    pub name: String,
}

fn parse_page_age(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.and_utc()))
        .ok()
}

impl BraveApiResponse {
    pub fn has_more(&self) -> bool {
        self.query.more_results_available
    }

    /// Convert to result items, dropping results whose URL cannot be canonicalized.
    pub fn into_items(self, source_id: &str) -> Vec<ResultItem> {
        self.web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| match ResultItem::new(source_id, &r.url, r.title) {
                Ok(item) => Some(
                    item.with_thumbnail(r.thumbnail.map(|t| t.src))
                        .with_author(r.profile.map(|p| p.name))
                        .with_published_at(r.page_age.as_deref().and_then(parse_page_age)),
                ),
                Err(e) => {
                    tracing::debug!(url = %r.url, "dropping result: {}", e);
                    None
                }
            })
            .collect()
    }
}
