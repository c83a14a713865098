//! Configuration validation rules.

use std::collections::HashSet;

use crate::config::{AppConfig, FeedConfig, PaginationStyle};
use thiserror::Error;

/// Source id the Brave web lane registers under.
pub const BRAVE_SOURCE_ID: &str = "web";

/// Accepted values for `brave_safesearch`.
pub const SAFESEARCH_LEVELS: [&str; 3] = ["off", "moderate", "strict"];

/// Longest accepted cache TTL: one year.
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `page_size` is outside 1..=50
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `cache_ttl_secs` is under a minute or over a year
    /// - `user_agent` is empty
    /// - `brave_safesearch` is not a known level
    /// - a feed is malformed or two sources share an id
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > 50 {
            return Err(invalid("page_size", "must be between 1 and 50"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.cache_ttl_secs < 60 {
            return Err(invalid("cache_ttl_secs", "must be at least 60 seconds"));
        }
        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(invalid("cache_ttl_secs", "must not exceed one year (31536000 seconds)"));
        }

        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if let Some(level) = &self.brave_safesearch
            && !SAFESEARCH_LEVELS.contains(&level.as_str())
        {
            return Err(invalid("brave_safesearch", "must be one of off, moderate, strict"));
        }

        let mut ids = HashSet::new();
        if self.brave_enabled {
            ids.insert(BRAVE_SOURCE_ID);
        }
        for (i, feed) in self.feeds.iter().enumerate() {
            validate_feed(i, feed)?;
            if feed.enabled && !ids.insert(feed.id.as_str()) {
                return Err(invalid(format!("feeds[{i}].id"), format!("duplicate source id '{}'", feed.id)));
            }
        }

        if ids.is_empty() {
            tracing::warn!("no sources enabled; searches will return empty lanes");
        }

        Ok(())
    }
}

fn validate_feed(i: usize, feed: &FeedConfig) -> Result<(), ConfigError> {
    if feed.id.trim().is_empty() {
        return Err(invalid(format!("feeds[{i}].id"), "must not be empty"));
    }

    match url::Url::parse(&feed.endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => return Err(invalid(format!("feeds[{i}].endpoint"), format!("unsupported scheme '{}'", url.scheme()))),
        Err(e) => return Err(invalid(format!("feeds[{i}].endpoint"), e.to_string())),
    }

    let mut pointers = vec![
        ("items_pointer", feed.items_pointer.as_str()),
        ("fields.url", feed.fields.url.as_str()),
        ("fields.title", feed.fields.title.as_str()),
    ];
    pointers.extend(feed.fields.thumbnail.as_deref().map(|p| ("fields.thumbnail", p)));
    pointers.extend(feed.fields.author.as_deref().map(|p| ("fields.author", p)));
    pointers.extend(feed.fields.published_at.as_deref().map(|p| ("fields.published_at", p)));
    pointers.extend(feed.has_more_pointer.as_deref().map(|p| ("has_more_pointer", p)));
    match &feed.pagination {
        PaginationStyle::Token { next_pointer, .. } | PaginationStyle::Cursor { next_pointer, .. } => {
            pointers.push(("pagination.next_pointer", next_pointer.as_str()));
        }
        PaginationStyle::Watermark { id_pointer, .. } => pointers.push(("pagination.id_pointer", id_pointer.as_str())),
        PaginationStyle::PageOffset { .. } => {}
    }

    for (field, pointer) in pointers {
        if !pointer.is_empty() && !pointer.starts_with('/') {
            return Err(invalid(format!("feeds[{i}].{field}"), "JSON pointer must be empty or start with '/'"));
        }
    }

    if feed.timeout_ms.is_some_and(|ms| !(100..=300_000).contains(&ms)) {
        return Err(invalid(format!("feeds[{i}].timeout_ms"), "must be between 100ms and 5 minutes"));
    }

    Ok(())
}
