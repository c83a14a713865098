//! JSON feed adapter error types.

use std::sync::Arc;

use trawl_core::SourceError;

/// Errors from a configured JSON feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The feed declares an API key but none is available.
    #[error("missing API key for feed '{feed}'")]
    MissingApiKey { feed: String, env: Option<String> },

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The upstream rejected the credentials.
    #[error("authentication failed: HTTP {status}")]
    Unauthorized { status: u16 },

    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    #[error("request timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Body is not JSON.
    #[error("parse error: {0}")]
    Parse(String),

    /// Body is JSON but not the configured shape.
    #[error("unexpected response shape: {0}")]
    Shape(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { FeedError::Timeout } else { FeedError::Network(Arc::new(err)) }
    }
}

impl FeedError {
    /// Project onto the lane error taxonomy.
    pub fn into_source_error(self, timeout_ms: u64) -> SourceError {
        match self {
            FeedError::MissingApiKey { feed, env: Some(var) } => {
                SourceError::not_configured(format!("set {var} to enable '{feed}'"))
            }
            FeedError::MissingApiKey { feed, env: None } => {
                SourceError::not_configured(format!("configure api_key for '{feed}'"))
            }
            FeedError::InvalidEndpoint(msg) => SourceError::not_configured(format!("invalid endpoint: {msg}")),
            FeedError::Unauthorized { status } => {
                SourceError::not_configured(format!("upstream rejected the API key (HTTP {status})"))
            }
            FeedError::Timeout => SourceError::Timeout { timeout_ms },
            FeedError::Parse(msg) | FeedError::Shape(msg) => SourceError::malformed(msg),
            other => SourceError::upstream(other.to_string()),
        }
    }
}
