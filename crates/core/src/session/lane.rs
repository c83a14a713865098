//! Per-source lane projection.

use serde::Serialize;

use crate::cursor::Cursor;
use crate::error::SourceError;
use crate::item::ResultItem;
use crate::reveal::Revealed;

/// A rendered result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaneItem {
    #[serde(flatten)]
    pub item: ResultItem,
    /// Already saved by the caller; display de-emphasis only.
    pub is_saved: bool,
}

/// What one source currently shows.
///
/// Rebuilt from reveal outcomes. The cache store, not the lane, decides what
/// to fetch next; `cursor` here mirrors the stored cursor for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaneState {
    pub source_id: String,
    pub results: Vec<LaneItem>,
    pub previously_shown: Vec<ResultItem>,
    pub has_more: bool,
    pub is_loading: bool,
    pub is_loading_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SourceError>,
    pub unavailable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

impl LaneState {
    pub fn idle(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            results: Vec::new(),
            previously_shown: Vec::new(),
            has_more: false,
            is_loading: false,
            is_loading_more: false,
            error: None,
            unavailable: false,
            cursor: None,
        }
    }

    pub(crate) fn loading(source_id: &str) -> Self {
        Self { is_loading: true, ..Self::idle(source_id) }
    }

    pub(crate) fn unavailable(source_id: &str) -> Self {
        Self { unavailable: true, ..Self::idle(source_id) }
    }

    /// Whether a load-more call would do anything.
    pub fn can_load_more(&self) -> bool {
        !self.is_loading && !self.is_loading_more && self.has_more && !self.unavailable
    }

    /// Canonical URLs currently rendered.
    pub(crate) fn rendered(&self) -> std::collections::HashSet<String> {
        self.results.iter().map(|r| r.item.canonical_url.clone()).collect()
    }

    /// Replace the lane with the first batch of a search.
    pub(crate) fn settle_search(&mut self, revealed: &Revealed) {
        self.results = revealed.items.iter().cloned().map(unsaved).collect();
        self.previously_shown = revealed.previously_shown.clone();
        self.has_more = revealed.has_more;
        self.cursor = revealed.cursor.clone();
        self.is_loading = false;
        self.error = None;
    }

    /// Append a load-more batch.
    pub(crate) fn settle_more(&mut self, revealed: &Revealed) {
        self.results.extend(revealed.items.iter().cloned().map(unsaved));
        self.has_more = revealed.has_more;
        self.cursor = revealed.cursor.clone();
        self.is_loading_more = false;
        self.error = None;
    }

    /// A failed search leaves nothing to page through; searching again retries.
    pub(crate) fn fail_search(&mut self, error: SourceError) {
        self.is_loading = false;
        self.has_more = false;
        self.error = Some(error);
    }

    /// A failed load-more keeps what is shown and can be retried.
    pub(crate) fn fail_more(&mut self, error: SourceError) {
        self.is_loading_more = false;
        self.error = Some(error);
    }
}

fn unsaved(item: ResultItem) -> LaneItem {
    LaneItem { item, is_saved: false }
}

/// Read-only projection of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionView {
    /// Query text of the active search.
    pub query: Option<String>,
    pub generation: u64,
    /// True until every lane of the active search has settled.
    pub searching: bool,
    pub lanes: Vec<LaneState>,
}

impl SessionView {
    pub fn lane(&self, source_id: &str) -> Option<&LaneState> {
        self.lanes.iter().find(|l| l.source_id == source_id)
    }
}

/// Outcome of [`Session::load_more`](super::Session::load_more).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadMore {
    /// A new batch was appended to the lane.
    Revealed { items: Vec<ResultItem>, has_more: bool },
    /// The source failed; the lane keeps its results and shows the error.
    Failed { error: SourceError },
    /// Nothing to do: loading, already loading more, or exhausted.
    Skipped,
    /// A newer search started while this call was in flight.
    Superseded,
}
