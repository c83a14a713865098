//! Query normalization and curated-entity resolution.
//!
//! A search is identified in the cache by its [`QueryKey`]: the trimmed text
//! with whitespace runs collapsed and letters lowercased. Typed text and a
//! curated selection whose display term normalizes to the same key share cache
//! entries. The string actually sent upstream may differ per source (hashtag
//! stripping, entity slugs); see [`SourceQuery`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Cache key for one search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A query after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    text: String,
    key: QueryKey,
}

impl NormalizedQuery {
    /// Trimmed query text as the user entered it.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// The request string for a source.
    ///
    /// Sources that treat a leading hashtag specially get it stripped; the
    /// cache key always keeps it.
    pub fn request_for(&self, strips_hashtag: bool) -> String {
        if strips_hashtag
            && let Some(rest) = self.text.strip_prefix('#')
            && !rest.trim().is_empty()
        {
            return rest.trim_start().to_string();
        }
        self.text.clone()
    }
}

/// Normalize free-text input.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if the input is empty after trimming.
pub fn normalize(raw: &str) -> Result<NormalizedQuery, Error> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(Error::InvalidInput("query cannot be empty".into()));
    }

    let key = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();

    Ok(NormalizedQuery { text: text.to_string(), key: QueryKey(key) })
}

/// How a curated entity maps onto one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceBinding {
    /// Search this source with a source-specific slug instead of the display name.
    Slug(String),
    /// The entity has no content on this source.
    Unavailable,
}

/// A named subject the caller can pick instead of typing text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedEntity {
    pub id: String,
    pub name: String,
    /// Localized display terms keyed by language tag (`"de"`, `"pt-BR"`).
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    /// Per-source overrides keyed by source id.
    #[serde(default)]
    pub sources: HashMap<String, SourceBinding>,
}

impl CuratedEntity {
    /// Display term for `language`: exact alias, then primary-subtag alias, then the name.
    pub fn display_term(&self, language: Option<&str>) -> &str {
        let Some(language) = language else {
            return &self.name;
        };

        if let Some(alias) = self.aliases.get(language) {
            return alias;
        }

        let primary = language.split(['-', '_']).next().unwrap_or(language);
        self.aliases.get(primary).map(String::as_str).unwrap_or(self.name.as_str())
    }
}

/// What to send to one source for the active search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceQuery {
    Request(String),
    /// The selected entity declares no content on this source.
    Unavailable,
}

/// Normalize a curated selection into the cache key shared with typed text.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if the display term is empty.
pub fn resolve_entity(entity: &CuratedEntity, language: Option<&str>) -> Result<NormalizedQuery, Error> {
    normalize(entity.display_term(language))
        .map_err(|_| Error::InvalidInput(format!("curated entity {} has an empty display term", entity.id)))
}

/// Resolve a curated selection into the request for one source.
pub fn resolve_selection(
    entity: &CuratedEntity, language: Option<&str>, source_id: &str, strips_hashtag: bool,
) -> SourceQuery {
    match entity.sources.get(source_id) {
        Some(SourceBinding::Unavailable) => SourceQuery::Unavailable,
        Some(SourceBinding::Slug(slug)) => SourceQuery::Request(slug.clone()),
        None => match resolve_entity(entity, language) {
            Ok(normalized) => SourceQuery::Request(normalized.request_for(strips_hashtag)),
            Err(_) => SourceQuery::Unavailable,
        },
    }
}
