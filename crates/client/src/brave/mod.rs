//! Brave Search API adapter.
//!
//! - **Endpoint**: `{base_url}/web/search`
//! - **Authentication**: `X-Subscription-Token` header
//! - **Pagination**: page index (`offset`, 0-9) with `count` results per page,
//!   carried as [`Cursor::PageOffset`]
//! - **Rate limiting**: one request per `min_interval` per client

pub mod error;
pub mod request;
pub mod response;

pub use error::BraveError;
pub use request::{MAX_PAGE, SafeSearch, SearchRequest};
pub use response::BraveApiResponse;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use tokio::sync::Mutex;
use tokio::time::Instant;
use trawl_core::config::BRAVE_SOURCE_ID;
use trawl_core::{AppConfig, Cursor, Page, Provider, SourceError};

const DEFAULT_BASE_URL: &str = "https://api.search.brave.com/res/v1";

/// Minimum interval between requests (free tier allows one per second).
const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// Results requested per upstream page.
const DEFAULT_COUNT: u8 = 20;

/// Brave adapter configuration.
#[derive(Debug, Clone)]
pub struct BraveConfig {
    /// Subscription token; requests fail with `NotConfigured` without it.
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub count: u8,
    pub min_interval: Duration,
    pub safesearch: Option<SafeSearch>,
    pub search_lang: Option<String>,
}

impl Default for BraveConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: trawl_core::provider::DEFAULT_TIMEOUT,
            user_agent: concat!("trawl/", env!("CARGO_PKG_VERSION")).to_string(),
            count: DEFAULT_COUNT,
            min_interval: MIN_REQUEST_INTERVAL,
            safesearch: None,
            search_lang: None,
        }
    }
}

impl BraveConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            api_key: config.require_brave_api_key().ok().map(str::to_string),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            search_lang: config
                .language
                .as_deref()
                .and_then(|l| l.split(['-', '_']).next())
                .map(str::to_lowercase),
            safesearch: config.brave_safesearch.as_deref().and_then(SafeSearch::parse),
            ..Default::default()
        }
    }
}

/// Spaces requests at least `min_interval` apart.
#[derive(Debug)]
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self { last_request: Mutex::new(None), min_interval }
    }

    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(at) = *last {
            let elapsed = at.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Brave Web Search client and provider.
#[derive(Debug, Clone)]
pub struct BraveClient {
    http: reqwest::Client,
    config: BraveConfig,
    rate_limiter: Arc<RateLimiter>,
}

impl BraveClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns `BraveError::Network` if the HTTP client cannot be built.
    pub fn new(config: BraveConfig) -> Result<Self, BraveError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| BraveError::Network(Arc::new(e)))?;
        let rate_limiter = Arc::new(RateLimiter::new(config.min_interval));

        Ok(Self { http, config, rate_limiter })
    }

    /// Execute one search call.
    ///
    /// # Errors
    ///
    /// Returns `BraveError` for a missing key, an invalid request, a non-2xx
    /// status, a transport failure or an undecodable body.
    pub async fn search(&self, req: &SearchRequest) -> Result<BraveApiResponse, BraveError> {
        let api_key = self.config.api_key.as_deref().ok_or(BraveError::MissingApiKey)?;
        req.validate()?;

        self.rate_limiter.acquire().await;

        let start = Instant::now();
        let url = format!("{}/web/search", self.config.base_url.trim_end_matches('/'));

        let response = self
            .http
            .get(&url)
            .header("X-Subscription-Token", api_key)
            .header(header::ACCEPT, "application/json")
            .query(req)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(%status, query = %req.q, page = req.offset.unwrap_or(0), "Brave API response");

        if status == 401 || status == 403 {
            return Err(BraveError::AuthError);
        }
        if status == 429 {
            return Err(BraveError::RateLimited);
        }
        if !status.is_success() {
            return Err(BraveError::HttpError { status: status.as_u16() });
        }

        let bytes = response.bytes().await?;
        let parsed: BraveApiResponse =
            serde_json::from_slice(&bytes).map_err(|e| BraveError::Parse(e.to_string()))?;

        tracing::debug!(
            elapsed = ?start.elapsed(),
            results = parsed.web.as_ref().map(|w| w.results.len()).unwrap_or(0),
            "Brave search completed"
        );

        Ok(parsed)
    }
}

#[async_trait]
impl Provider for BraveClient {
    fn id(&self) -> &str {
        BRAVE_SOURCE_ID
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }

    async fn fetch_page(&self, query: &str, cursor: Option<&Cursor>) -> Result<Page, SourceError> {
        let (page, offset) = Cursor::page_offset(cursor, 0)?;
        let Ok(page_index) = u8::try_from(page) else {
            return Ok(Page::default());
        };
        if page_index > MAX_PAGE {
            return Ok(Page::default());
        }

        let req = SearchRequest {
            q: query.to_string(),
            count: Some(self.config.count),
            offset: Some(page_index),
            safesearch: self.config.safesearch,
            search_lang: self.config.search_lang.clone(),
            ..Default::default()
        };

        let timeout_ms = self.config.timeout.as_millis() as u64;
        let response = self.search(&req).await.map_err(|e| e.into_source_error(timeout_ms))?;

        let more = response.has_more() && page_index < MAX_PAGE;
        let items = response.into_items(BRAVE_SOURCE_ID);
        let next_cursor = more.then(|| Cursor::PageOffset { page: page + 1, offset: offset + items.len() as u32 });

        Ok(Page { items, has_more: more, next_cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_app_config() {
        let app = AppConfig {
            brave_api_key: Some("secret".into()),
            language: Some("pt-BR".into()),
            timeout_ms: 5_000,
            brave_safesearch: Some("strict".into()),
            ..Default::default()
        };
        let config = BraveConfig::from_app(&app);

        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.search_lang.as_deref(), Some("pt"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.safesearch, Some(SafeSearch::Strict));

        assert!(BraveConfig::from_app(&AppConfig::default()).safesearch.is_none());
    }

    #[test]
    fn test_blank_key_is_missing() {
        let app = AppConfig { brave_api_key: Some("".into()), ..Default::default() };
        assert!(BraveConfig::from_app(&app).api_key.is_none());
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let client = BraveClient::new(BraveConfig::default()).unwrap();
        let err = client.fetch_page("rust", None).await.unwrap_err();
        assert!(err.is_setup_problem());
    }

    #[tokio::test]
    async fn test_rejects_foreign_cursor() {
        let client = BraveClient::new(BraveConfig { api_key: Some("k".into()), ..Default::default() }).unwrap();
        let cursor = Cursor::OpaqueToken { token: "abc".into() };
        let err = client.fetch_page("rust", Some(&cursor)).await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidCursor { .. }));
    }

    #[tokio::test]
    async fn test_past_last_page_is_empty_and_final() {
        let client = BraveClient::new(BraveConfig { api_key: Some("k".into()), ..Default::default() }).unwrap();
        let cursor = Cursor::PageOffset { page: u32::from(MAX_PAGE) + 1, offset: 200 };
        let page = client.fetch_page("rust", Some(&cursor)).await.unwrap();
        assert_eq!(page, Page::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
