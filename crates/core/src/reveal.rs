//! Reveal engine: serve the next batch for one source.
//!
//! Each invocation serves at most `page_size` items the caller has not seen,
//! from the cache when it holds enough unseen results and otherwise with a
//! single upstream page fetch. The cache entry only ever grows; the shown
//! boundary only ever advances.

use std::collections::HashSet;

use crate::cache::{CacheEntry, EntryPatch};
use crate::cursor::Cursor;
use crate::error::SourceError;
use crate::item::ResultItem;
use crate::provider::Provider;

/// Inputs for one reveal.
pub struct RevealRequest<'a> {
    pub provider: &'a dyn Provider,
    /// Current cache entry for this `(query, source)`, if any.
    pub entry: Option<&'a CacheEntry>,
    /// String sent upstream for this source.
    pub request: &'a str,
    /// Canonical URLs already rendered in the lane.
    pub rendered: &'a HashSet<String>,
    pub page_size: usize,
}

/// Outcome of one reveal.
#[derive(Debug, Clone, PartialEq)]
pub struct Revealed {
    /// The new batch, at most `page_size` items.
    pub items: Vec<ResultItem>,
    /// Items shown in earlier sessions, for optional collapsed history.
    pub previously_shown: Vec<ResultItem>,
    pub has_more: bool,
    /// Whether an upstream call was made.
    pub fetched: bool,
    /// Cursor the entry will hold once the patch is committed.
    pub cursor: Option<Cursor>,
    /// Changes to merge into the cache entry.
    pub patch: EntryPatch,
}

/// Serve the next batch for one source.
///
/// # Errors
///
/// Returns the provider's `SourceError`, or `SourceError::Timeout` when the
/// fetch exceeds the provider's timeout. Nothing is served and nothing needs
/// to be persisted in that case.
pub async fn reveal(req: RevealRequest<'_>) -> Result<Revealed, SourceError> {
    let RevealRequest { provider, entry, request, rendered, page_size } = req;

    let history: &[ResultItem] = entry.map(|e| e.results.as_slice()).unwrap_or_default();
    let (shown, pending): (&[ResultItem], &[ResultItem]) = entry.map(|e| (e.shown(), e.unseen())).unwrap_or_default();
    let displayed = shown.len();

    // A cursor only makes sense for the request it was issued for.
    let drifted = entry
        .and_then(|e| e.upstream_query.as_deref())
        .is_some_and(|stored| stored != request);
    let (cursor, upstream_more) = match entry {
        Some(e) if !drifted => (e.pagination_cursor.clone(), e.has_more_upstream),
        _ => (None, true),
    };

    let unseen = pending
        .iter()
        .filter(|item| !rendered.contains(&item.canonical_url))
        .count();

    let mut fresh: Vec<ResultItem> = Vec::new();
    let mut fetched = false;
    let mut next_cursor = cursor.clone();
    let mut more_upstream = upstream_more;

    if unseen < page_size && upstream_more {
        let timeout = provider.timeout();
        let page = match tokio::time::timeout(timeout, provider.fetch_page(request, cursor.as_ref())).await {
            Ok(result) => result?,
            Err(_) => return Err(SourceError::Timeout { timeout_ms: timeout.as_millis() as u64 }),
        };
        fetched = true;

        let mut known: HashSet<String> = history.iter().map(|i| i.canonical_url.clone()).collect();
        let fetched_count = page.items.len();
        for item in page.items {
            if known.insert(item.canonical_url.clone()) {
                fresh.push(item);
            }
        }

        tracing::debug!(
            source = provider.id(),
            fetched = fetched_count,
            new = fresh.len(),
            has_more = page.has_more,
            "fetched upstream page"
        );

        next_cursor = page.next_cursor;
        more_upstream = page.has_more;
    }

    // Walk from the shown boundary. Items already rendered count as shown
    // without being served again.
    let mut items = Vec::with_capacity(page_size);
    let mut position = displayed;
    for item in history.iter().chain(fresh.iter()).skip(displayed) {
        if items.len() == page_size {
            break;
        }
        position += 1;
        if !rendered.contains(&item.canonical_url) {
            items.push(item.clone());
        }
    }

    let cache_remaining = history
        .iter()
        .chain(fresh.iter())
        .skip(position)
        .any(|item| !rendered.contains(&item.canonical_url));

    let previously_shown = shown
        .iter()
        .filter(|item| !rendered.contains(&item.canonical_url))
        .cloned()
        .collect();

    tracing::debug!(
        source = provider.id(),
        served = items.len(),
        from_cache = !fetched,
        displayed = position,
        "revealed batch"
    );

    let patch = EntryPatch {
        append: fresh,
        displayed_count: Some(position),
        cursor: fetched.then(|| next_cursor.clone()),
        has_more_upstream: fetched.then_some(more_upstream),
        upstream_query: fetched.then(|| request.to_string()),
    };

    Ok(Revealed {
        items,
        previously_shown,
        has_more: cache_remaining || more_upstream,
        fetched,
        cursor: next_cursor,
        patch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedProvider, items};
    use chrono::Utc;
    use std::time::Duration;

    fn entry_from(results: Vec<ResultItem>, displayed: usize, has_more_upstream: bool) -> CacheEntry {
        CacheEntry {
            results,
            displayed_count: displayed,
            pagination_cursor: Some(Cursor::OpaqueToken { token: "next".into() }),
            has_more_upstream,
            upstream_query: Some("rust".into()),
            updated_at: Utc::now(),
            revision: 1,
        }
    }

    fn urls(items: &[ResultItem]) -> Vec<String> {
        items.iter().map(|i| i.canonical_url.clone()).collect()
    }

    #[tokio::test]
    async fn test_first_search_fetches_once_and_keeps_leftovers() {
        let provider = ScriptedProvider::new("web").page(items("web", 0..10), true, Some("p2"));
        let rendered = HashSet::new();

        let out = reveal(RevealRequest { provider: &provider, entry: None, request: "rust", rendered: &rendered, page_size: 6 })
            .await
            .unwrap();

        assert_eq!(out.items.len(), 6);
        assert!(out.fetched);
        assert!(out.has_more);
        assert_eq!(provider.calls(), 1);
        assert_eq!(out.patch.append.len(), 10);
        assert_eq!(out.patch.displayed_count, Some(6));
        assert_eq!(out.patch.cursor, Some(Some(Cursor::OpaqueToken { token: "p2".into() })));
        assert_eq!(out.patch.upstream_query.as_deref(), Some("rust"));
    }

    #[tokio::test]
    async fn test_enough_unseen_serves_from_cache() {
        let provider = ScriptedProvider::new("web");
        let entry = entry_from(items("web", 0..20), 6, true);
        let rendered = HashSet::new();

        let out = reveal(RevealRequest {
            provider: &provider,
            entry: Some(&entry),
            request: "rust",
            rendered: &rendered,
            page_size: 6,
        })
        .await
        .unwrap();

        assert_eq!(provider.calls(), 0);
        assert!(!out.fetched);
        assert_eq!(urls(&out.items), urls(&entry.results[6..12]));
        assert_eq!(out.patch, EntryPatch::displayed(12));
        assert_eq!(out.previously_shown.len(), 6);
        assert!(out.has_more);
    }

    #[tokio::test]
    async fn test_shown_count_past_results_is_clamped() {
        let provider = ScriptedProvider::new("web").page(items("web", 4..8), false, None);
        let entry = entry_from(items("web", 0..4), 9, true);
        let rendered = HashSet::new();

        let out = reveal(RevealRequest {
            provider: &provider,
            entry: Some(&entry),
            request: "rust",
            rendered: &rendered,
            page_size: 6,
        })
        .await
        .unwrap();

        assert_eq!(provider.calls(), 1);
        assert_eq!(urls(&out.items), urls(&items("web", 4..8)));
        assert_eq!(out.previously_shown.len(), 4);
        assert_eq!(out.patch.displayed_count, Some(8));
        assert!(!out.has_more);
    }

    #[tokio::test]
    async fn test_short_cache_tops_up_with_dedup_against_history() {
        // 8 cached, 6 shown: 2 unseen. Upstream repeats two old items.
        let cached = items("web", 0..8);
        let mut page = items("web", 4..6);
        page.extend(items("web", 8..14));
        let provider = ScriptedProvider::new("web").page(page, true, Some("p3"));
        let entry = entry_from(cached, 6, true);
        let rendered = HashSet::new();

        let out = reveal(RevealRequest {
            provider: &provider,
            entry: Some(&entry),
            request: "rust",
            rendered: &rendered,
            page_size: 6,
        })
        .await
        .unwrap();

        assert_eq!(provider.calls(), 1);
        assert_eq!(provider.cursors(), vec![Some(Cursor::OpaqueToken { token: "next".into() })]);
        let mut expected = urls(&entry.results[6..8]);
        expected.extend(urls(&items("web", 8..12)));
        assert_eq!(urls(&out.items), expected);
        assert_eq!(urls(&out.patch.append), urls(&items("web", 8..14)));
        assert_eq!(out.patch.displayed_count, Some(12));
        assert!(out.has_more);
    }

    #[tokio::test]
    async fn test_rendered_items_are_never_served_again() {
        // Persisted boundary lags behind what the lane already shows.
        let entry = entry_from(items("web", 0..12), 0, true);
        let rendered: HashSet<String> = urls(&entry.results[0..6]).into_iter().collect();
        let provider = ScriptedProvider::new("web");

        let out = reveal(RevealRequest {
            provider: &provider,
            entry: Some(&entry),
            request: "rust",
            rendered: &rendered,
            page_size: 6,
        })
        .await
        .unwrap();

        assert_eq!(provider.calls(), 0);
        assert_eq!(urls(&out.items), urls(&entry.results[6..12]));
        assert_eq!(out.patch.displayed_count, Some(12));
        assert!(out.items.iter().all(|i| !rendered.contains(&i.canonical_url)));
    }

    #[tokio::test]
    async fn test_short_final_batch_is_terminal() {
        let provider = ScriptedProvider::new("web").page(items("web", 0..4), false, None);
        let rendered = HashSet::new();

        let out = reveal(RevealRequest { provider: &provider, entry: None, request: "rust", rendered: &rendered, page_size: 6 })
            .await
            .unwrap();

        assert_eq!(out.items.len(), 4);
        assert!(!out.has_more);
        assert_eq!(out.patch.has_more_upstream, Some(false));
        assert_eq!(out.patch.cursor, Some(None));
    }

    #[tokio::test]
    async fn test_exhausted_upstream_is_not_called_again() {
        let provider = ScriptedProvider::new("web");
        let entry = entry_from(items("web", 0..8), 6, false);
        let rendered = HashSet::new();

        let out = reveal(RevealRequest {
            provider: &provider,
            entry: Some(&entry),
            request: "rust",
            rendered: &rendered,
            page_size: 6,
        })
        .await
        .unwrap();

        assert_eq!(provider.calls(), 0);
        assert_eq!(out.items.len(), 2);
        assert!(!out.has_more);
    }

    #[tokio::test]
    async fn test_request_drift_restarts_pagination() {
        let provider = ScriptedProvider::new("web").page(items("web", 8..16), true, Some("x2"));
        let entry = entry_from(items("web", 0..8), 8, false);
        let rendered = HashSet::new();

        let out = reveal(RevealRequest {
            provider: &provider,
            entry: Some(&entry),
            request: "rock-climbing",
            rendered: &rendered,
            page_size: 6,
        })
        .await
        .unwrap();

        assert_eq!(provider.cursors(), vec![None]);
        assert_eq!(out.items.len(), 6);
        assert_eq!(out.patch.upstream_query.as_deref(), Some("rock-climbing"));
    }

    #[tokio::test]
    async fn test_provider_error_is_returned() {
        let provider = ScriptedProvider::new("web").fail(SourceError::upstream("HTTP 503"));
        let rendered = HashSet::new();

        let result =
            reveal(RevealRequest { provider: &provider, entry: None, request: "rust", rendered: &rendered, page_size: 6 })
                .await;

        assert_eq!(result.unwrap_err(), SourceError::upstream("HTTP 503"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_bounded_by_provider() {
        let provider = ScriptedProvider::new("slow")
            .page(items("slow", 0..6), true, None)
            .delay(Duration::from_secs(60))
            .timeout(Duration::from_secs(15));
        let rendered = HashSet::new();

        let result =
            reveal(RevealRequest { provider: &provider, entry: None, request: "rust", rendered: &rendered, page_size: 6 })
                .await;

        assert_eq!(result.unwrap_err(), SourceError::Timeout { timeout_ms: 15_000 });
    }

    #[tokio::test]
    async fn test_duplicates_within_one_page_are_dropped() {
        let mut page = items("web", 0..3);
        page.extend(items("web", 0..3));
        let provider = ScriptedProvider::new("web").page(page, false, None);
        let rendered = HashSet::new();

        let out = reveal(RevealRequest { provider: &provider, entry: None, request: "rust", rendered: &rendered, page_size: 6 })
            .await
            .unwrap();

        assert_eq!(out.items.len(), 3);
        assert_eq!(out.patch.append.len(), 3);
    }
}
