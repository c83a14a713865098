//! Configurable JSON feed adapter.
//!
//! One [`JsonFeedProvider`] per `[[feeds]]` entry. The pagination style picks
//! the cursor variant the feed accepts:
//!
//! | style         | cursor                    | request parameter            |
//! |---------------|---------------------------|------------------------------|
//! | `page_offset` | [`Cursor::PageOffset`]    | page number (+ item offset)  |
//! | `token`       | [`Cursor::OpaqueToken`]   | next-page token              |
//! | `cursor`      | [`Cursor::OpaqueCursor`]  | opaque cursor                |
//! | `watermark`   | [`Cursor::Watermark`]     | id of the last item seen     |

pub mod error;
pub mod parse;

pub use error::FeedError;
pub use parse::parse_page;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use trawl_core::config::{FeedConfig, PaginationStyle};
use trawl_core::{Cursor, Page, Provider, SourceError};
use url::Url;

/// Provider backed by a configured JSON endpoint.
#[derive(Debug, Clone)]
pub struct JsonFeedProvider {
    http: reqwest::Client,
    config: FeedConfig,
    endpoint: Url,
    timeout: Duration,
}

impl JsonFeedProvider {
    /// Create a provider for `config`.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::InvalidEndpoint` if the endpoint does not parse, or
    /// `FeedError::Network` if the HTTP client cannot be built.
    pub fn new(config: FeedConfig, user_agent: &str, default_timeout: Duration) -> Result<Self, FeedError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| FeedError::InvalidEndpoint(e.to_string()))?;
        let timeout = config.timeout(default_timeout);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| FeedError::Network(Arc::new(e)))?;

        Ok(Self { http, config, endpoint, timeout })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Request URL for `query` at `cursor`, plus the requested page position
    /// for page-numbered feeds.
    fn request_url(&self, query: &str, cursor: Option<&Cursor>) -> Result<(Url, Option<(u32, u32)>), SourceError> {
        let mut url = self.endpoint.clone();
        let mut position = None;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair(&self.config.query_param, query);

            match &self.config.pagination {
                PaginationStyle::PageOffset { page_param, offset_param, first_page } => {
                    let (page, offset) = Cursor::page_offset(cursor, *first_page)?;
                    pairs.append_pair(page_param, &page.to_string());
                    if let Some(offset_param) = offset_param {
                        pairs.append_pair(offset_param, &offset.to_string());
                    }
                    position = Some((page, offset));
                }
                PaginationStyle::Token { param, .. } => {
                    if let Some(token) = Cursor::token(cursor)? {
                        pairs.append_pair(param, token);
                    }
                }
                PaginationStyle::Cursor { param, .. } => {
                    if let Some(opaque) = Cursor::opaque(cursor)? {
                        pairs.append_pair(param, opaque);
                    }
                }
                PaginationStyle::Watermark { param, .. } => {
                    if let Some(id) = Cursor::watermark(cursor)? {
                        pairs.append_pair(param, id);
                    }
                }
            }
        }
        Ok((url, position))
    }

    async fn fetch(&self, url: Url, position: Option<(u32, u32)>) -> Result<Page, FeedError> {
        let mut request = self.http.get(url).header(header::ACCEPT, "application/json");
        if self.config.needs_api_key() {
            let key = self.config.resolve_api_key().ok_or_else(|| FeedError::MissingApiKey {
                feed: self.config.id.clone(),
                env: self.config.api_key_env.clone(),
            })?;
            request = request.header(self.config.api_key_header.as_str(), key);
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!(feed = %self.config.id, %status, "feed response");

        if status == 401 || status == 403 {
            return Err(FeedError::Unauthorized { status: status.as_u16() });
        }
        if !status.is_success() {
            return Err(FeedError::HttpError { status: status.as_u16() });
        }

        let bytes = response.bytes().await?;
        let body: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| FeedError::Parse(e.to_string()))?;

        parse_page(&self.config, &body, position)
    }
}

#[async_trait]
impl Provider for JsonFeedProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn strips_hashtag(&self) -> bool {
        self.config.strips_hashtag
    }

    async fn fetch_page(&self, query: &str, cursor: Option<&Cursor>) -> Result<Page, SourceError> {
        let (url, position) = self.request_url(query, cursor)?;
        let timeout_ms = self.timeout.as_millis() as u64;
        self.fetch(url, position).await.map_err(|e| e.into_source_error(timeout_ms))
    }
}
