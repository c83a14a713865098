//! Scripted providers for exercising the reveal engine and session without
//! network access. Enabled for this crate's tests and, through the `testing`
//! feature, for dependent crates.

use std::collections::{HashMap, VecDeque};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::cursor::Cursor;
use crate::error::SourceError;
use crate::item::ResultItem;
use crate::provider::{DEFAULT_TIMEOUT, Page, Provider};

/// Build `ResultItem`s with stable URLs `https://{source}.example/{n}`.
pub fn items(source: &str, range: Range<usize>) -> Vec<ResultItem> {
    range
        .map(|n| ResultItem {
            canonical_url: format!("https://{source}.example/{n}"),
            title: format!("{source} result {n}"),
            thumbnail: None,
            author: None,
            published_at: None,
            source_id: source.to_string(),
        })
        .collect()
}

type Scripted = Result<Page, SourceError>;

/// A provider that replays queued responses.
///
/// Responses queued with [`ScriptedProvider::page`] or
/// [`ScriptedProvider::fail`] answer any query; the `*_for` variants answer
/// only one request string and take precedence. An exhausted script answers
/// with an empty, final page.
pub struct ScriptedProvider {
    id: String,
    timeout: Duration,
    strips_hashtag: bool,
    delay: Duration,
    delays: HashMap<String, Duration>,
    any: Mutex<VecDeque<Scripted>>,
    by_query: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, Option<Cursor>)>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn page_of(items: Vec<ResultItem>, has_more: bool, next_token: Option<&str>) -> Page {
    Page { items, has_more, next_cursor: next_token.map(|token| Cursor::OpaqueToken { token: token.to_string() }) }
}

impl ScriptedProvider {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            timeout: DEFAULT_TIMEOUT,
            strips_hashtag: false,
            delay: Duration::ZERO,
            delays: HashMap::new(),
            any: Mutex::new(VecDeque::new()),
            by_query: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Queue a page; `next_token` becomes an opaque-token cursor.
    pub fn page(self, items: Vec<ResultItem>, has_more: bool, next_token: Option<&str>) -> Self {
        lock(&self.any).push_back(Ok(page_of(items, has_more, next_token)));
        self
    }

    /// Queue a page answered only for `query`.
    pub fn page_for(self, query: &str, items: Vec<ResultItem>, has_more: bool, next_token: Option<&str>) -> Self {
        lock(&self.by_query)
            .entry(query.to_string())
            .or_default()
            .push_back(Ok(page_of(items, has_more, next_token)));
        self
    }

    /// Queue a failure.
    pub fn fail(self, err: SourceError) -> Self {
        lock(&self.any).push_back(Err(err));
        self
    }

    /// Delay every response.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Delay responses for one request string.
    pub fn delay_for(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn strips_hashtag(mut self) -> Self {
        self.strips_hashtag = true;
        self
    }

    /// Number of fetches made so far, including ones that timed out.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Cursor passed to each fetch, in call order.
    pub fn cursors(&self) -> Vec<Option<Cursor>> {
        lock(&self.seen).iter().map(|(_, c)| c.clone()).collect()
    }

    /// Request string passed to each fetch, in call order.
    pub fn queries(&self) -> Vec<String> {
        lock(&self.seen).iter().map(|(q, _)| q.clone()).collect()
    }

    fn next_response(&self, query: &str) -> Scripted {
        if let Some(queue) = lock(&self.by_query).get_mut(query)
            && let Some(response) = queue.pop_front()
        {
            return response;
        }
        lock(&self.any).pop_front().unwrap_or_else(|| Ok(Page::default()))
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn strips_hashtag(&self) -> bool {
        self.strips_hashtag
    }

    async fn fetch_page(&self, query: &str, cursor: Option<&Cursor>) -> Result<Page, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.seen).push((query.to_string(), cursor.cloned()));

        // Take the response before sleeping so overlapping calls keep call order.
        let response = self.next_response(query);
        let delay = self.delays.get(query).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        response
    }
}
