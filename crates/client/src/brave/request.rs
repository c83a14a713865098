//! Brave Search API request types and validation.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::BraveError;

static DATE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").ok());

/// Query parameters for one Brave Web Search call.
///
/// `offset` is a page index, not an item offset: Brave serves pages of
/// `count` results and allows at most ten of them.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct SearchRequest {
    /// Search query (required, max 400 chars / 50 words).
    pub q: String,

    /// Results per page (1-20, default 20).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u8>,

    /// Page index (0-9, default 0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u8>,

    /// Freshness filter: pd|pw|pm|py or YYYY-MM-DDtoYYYY-MM-DD.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub safesearch: Option<SafeSearch>,

    /// Country code (ISO 3166-1 alpha-2).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// Content language (ISO 639-1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_lang: Option<String>,
}

/// Safe search filtering levels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SafeSearch {
    Off,
    Moderate,
    Strict,
}

impl SafeSearch {
    /// Parse a configured level (`off`, `moderate` or `strict`).
    pub fn parse(level: &str) -> Option<Self> {
        match level {
            "off" => Some(Self::Off),
            "moderate" => Some(Self::Moderate),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

/// Highest page index Brave accepts.
pub const MAX_PAGE: u8 = 9;

impl SearchRequest {
    /// Validate the request parameters.
    ///
    /// # Errors
    ///
    /// Returns a `BraveError` naming the first parameter that is out of range
    /// or malformed.
    pub fn validate(&self) -> Result<(), BraveError> {
        if self.q.trim().is_empty() {
            return Err(BraveError::InvalidQuery("query cannot be empty".to_string()));
        }

        if self.q.len() > 400 {
            return Err(BraveError::InvalidQuery(format!("query too long: {} chars (max 400)", self.q.len())));
        }

        let word_count = self.q.split_whitespace().count();
        if word_count > 50 {
            return Err(BraveError::InvalidQuery(format!("query too long: {word_count} words (max 50)")));
        }

        if let Some(count) = self.count
            && !(1..=20).contains(&count)
        {
            return Err(BraveError::InvalidCount);
        }

        if let Some(offset) = self.offset
            && offset > MAX_PAGE
        {
            return Err(BraveError::InvalidOffset);
        }

        if let Some(freshness) = &self.freshness {
            validate_freshness(freshness)?;
        }

        Ok(())
    }
}

fn validate_freshness(freshness: &str) -> Result<(), BraveError> {
    if ["pd", "pw", "pm", "py"].contains(&freshness) {
        return Ok(());
    }

    if let (Some((from, to)), Some(date)) = (freshness.split_once("to"), DATE.as_ref())
        && date.is_match(from)
        && date.is_match(to)
    {
        return Ok(());
    }

    Err(BraveError::InvalidFreshness(freshness.to_string()))
}
