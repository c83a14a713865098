//! Brave API client error types.

use std::sync::Arc;

use trawl_core::SourceError;

/// Errors from the Brave Search API client.
#[derive(Debug, thiserror::Error)]
pub enum BraveError {
    /// No subscription token configured.
    #[error("missing API key: TRAWL_BRAVE_API_KEY not set")]
    MissingApiKey,

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid count: must be 1-20")]
    InvalidCount,

    #[error("invalid offset: must be 0-9")]
    InvalidOffset,

    #[error("invalid freshness format: {0}")]
    InvalidFreshness(String),

    /// Authentication failed (invalid API key).
    #[error("authentication failed: invalid API key")]
    AuthError,

    #[error("rate limited: too many requests")]
    RateLimited,

    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    #[error("request timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for BraveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { BraveError::Timeout } else { BraveError::Network(Arc::new(err)) }
    }
}

impl BraveError {
    /// Project onto the lane error taxonomy.
    pub fn into_source_error(self, timeout_ms: u64) -> SourceError {
        match self {
            BraveError::MissingApiKey => SourceError::not_configured("set TRAWL_BRAVE_API_KEY to enable web results"),
            BraveError::AuthError => SourceError::not_configured("Brave rejected the API key; check TRAWL_BRAVE_API_KEY"),
            BraveError::Timeout => SourceError::Timeout { timeout_ms },
            BraveError::Parse(msg) => SourceError::malformed(msg),
            other => SourceError::upstream(other.to_string()),
        }
    }
}
