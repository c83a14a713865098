//! Per-(query, source) cache entries and their merge rules.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::cursor::Cursor;
use crate::item::ResultItem;

/// Accumulated results and pagination state for one source under one query.
///
/// `results` never holds two items with the same canonical URL and only grows
/// by appending; `displayed_count` never exceeds `results.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub results: Vec<ResultItem>,
    pub displayed_count: usize,
    pub pagination_cursor: Option<Cursor>,
    pub has_more_upstream: bool,
    /// Request string the cursor belongs to.
    #[serde(default)]
    pub upstream_query: Option<String>,
    pub updated_at: DateTime<Utc>,
    /// Incremented on every merge; orders persistence writes.
    #[serde(default)]
    pub revision: u64,
}

impl CacheEntry {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            results: Vec::new(),
            displayed_count: 0,
            pagination_cursor: None,
            has_more_upstream: true,
            upstream_query: None,
            updated_at: now,
            revision: 0,
        }
    }

    /// Logically absent once older than `ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.updated_at > ttl
    }

    /// Results not yet marked shown.
    pub fn unseen(&self) -> &[ResultItem] {
        &self.results[self.displayed_count.min(self.results.len())..]
    }

    /// Results already marked shown.
    pub fn shown(&self) -> &[ResultItem] {
        &self.results[..self.displayed_count.min(self.results.len())]
    }

    /// Merge `patch` into this entry.
    pub fn apply(&mut self, patch: EntryPatch, now: DateTime<Utc>) {
        let mut known: HashSet<String> = self.results.iter().map(|i| i.canonical_url.clone()).collect();
        for item in patch.append {
            if known.insert(item.canonical_url.clone()) {
                self.results.push(item);
            }
        }

        if let Some(displayed) = patch.displayed_count {
            self.displayed_count = self.displayed_count.max(displayed);
        }
        self.displayed_count = self.displayed_count.min(self.results.len());

        if let Some(cursor) = patch.cursor {
            self.pagination_cursor = cursor;
        }
        if let Some(has_more) = patch.has_more_upstream {
            self.has_more_upstream = has_more;
        }
        if let Some(query) = patch.upstream_query {
            self.upstream_query = Some(query);
        }

        self.updated_at = now;
        self.revision += 1;
    }
}

/// Fields to merge into a cache entry. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    /// Items to append; ones already present are ignored.
    pub append: Vec<ResultItem>,
    /// New shown boundary; the stored value never moves backwards.
    pub displayed_count: Option<usize>,
    /// Replacement cursor (`Some(None)` records an exhausted source).
    pub cursor: Option<Option<Cursor>>,
    pub has_more_upstream: Option<bool>,
    pub upstream_query: Option<String>,
}

impl EntryPatch {
    pub fn displayed(count: usize) -> Self {
        Self { displayed_count: Some(count), ..Default::default() }
    }
}
