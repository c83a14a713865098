//! Search orchestration.
//!
//! A [`Session`] fans one query out to every registered source at once and
//! keeps one [`LaneState`] per source. Lanes settle independently: each is
//! written as soon as its own reveal finishes, and one source failing or timing
//! out never holds back the others.
//!
//! Work from a superseded search is not cancelled. Every search bumps a
//! generation counter; a lane outcome is only written (to the lane and to the
//! cache) if its generation is still current.

mod lane;

pub use lane::{LaneItem, LaneState, LoadMore, SessionView};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;
use tokio::sync::{Mutex, watch};

use crate::Error;
use crate::cache::{CacheEntry, CacheStore, Swept};
use crate::item::canonical_url;
use crate::provider::{Provider, ProviderRegistry};
use crate::query::{self, CuratedEntity, QueryKey, SourceQuery};
use crate::reveal::{RevealRequest, reveal};

/// Default number of items revealed per search or load-more.
pub const DEFAULT_PAGE_SIZE: usize = 6;

/// Per-session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub page_size: usize,
    /// Language tag used to pick curated entity aliases.
    pub language: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { page_size: DEFAULT_PAGE_SIZE, language: None }
    }
}

/// The search currently shown.
#[derive(Debug, Clone)]
struct ActiveSearch {
    generation: u64,
    key: QueryKey,
    /// Request per source id.
    requests: HashMap<String, SourceQuery>,
}

#[derive(Debug, Default)]
struct SessionState {
    active: Option<ActiveSearch>,
    query: Option<String>,
    searching: bool,
    lanes: Vec<LaneState>,
}

impl SessionState {
    fn lane_mut(&mut self, source_id: &str) -> Option<&mut LaneState> {
        self.lanes.iter_mut().find(|l| l.source_id == source_id)
    }
}

/// One caller's search session.
pub struct Session {
    registry: ProviderRegistry,
    store: Arc<CacheStore>,
    config: SessionConfig,
    generation: AtomicU64,
    state: Mutex<SessionState>,
    view_tx: watch::Sender<SessionView>,
}

impl Session {
    /// Start a session, sweeping expired cache entries first.
    pub async fn start(registry: ProviderRegistry, store: Arc<CacheStore>, config: SessionConfig) -> Self {
        store.sweep_expired().await;

        let lanes: Vec<LaneState> = registry.iter().map(|p| LaneState::idle(p.id())).collect();
        let (view_tx, _) = watch::channel(SessionView { lanes: lanes.clone(), ..SessionView::default() });

        tracing::info!(sources = registry.len(), page_size = config.page_size, "session started");

        Self {
            registry,
            store,
            config,
            generation: AtomicU64::new(0),
            state: Mutex::new(SessionState { lanes, ..SessionState::default() }),
            view_tx,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current projection.
    pub fn view(&self) -> SessionView {
        self.view_tx.borrow().clone()
    }

    /// Receive every projection change.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_tx.subscribe()
    }

    /// Search typed text across every source.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an empty query. Source failures do not
    /// fail the search; they are reported on their lanes.
    pub async fn search(&self, raw: &str) -> Result<SessionView, Error> {
        let normalized = query::normalize(raw)?;
        let requests = self
            .registry
            .iter()
            .map(|p| (p.id().to_string(), SourceQuery::Request(normalized.request_for(p.strips_hashtag()))))
            .collect();

        Ok(self.run_search(normalized.text().to_string(), normalized.key().clone(), requests).await)
    }

    /// Search a curated entity across every source.
    ///
    /// Shares cache entries with typed text whose key matches the entity's
    /// display term. `language` overrides the session language for alias lookup.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the entity has no usable display term.
    pub async fn search_entity(&self, entity: &CuratedEntity, language: Option<&str>) -> Result<SessionView, Error> {
        let language = language.or(self.config.language.as_deref());
        let normalized = query::resolve_entity(entity, language)?;
        let requests = self
            .registry
            .iter()
            .map(|p| {
                let request = query::resolve_selection(entity, language, p.id(), p.strips_hashtag());
                (p.id().to_string(), request)
            })
            .collect();

        Ok(self.run_search(normalized.text().to_string(), normalized.key().clone(), requests).await)
    }

    async fn run_search(&self, text: String, key: QueryKey, requests: HashMap<String, SourceQuery>) -> SessionView {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(query = %key, generation, "search started");

        {
            let mut state = self.state.lock().await;
            state.lanes = self
                .registry
                .iter()
                .map(|p| match requests.get(p.id()) {
                    Some(SourceQuery::Unavailable) => LaneState::unavailable(p.id()),
                    _ => LaneState::loading(p.id()),
                })
                .collect();
            state.active = Some(ActiveSearch { generation, key: key.clone(), requests: requests.clone() });
            state.query = Some(text);
            state.searching = true;
            self.publish(generation, &state);
        }

        let entries = self.store.get(&key).await;

        let lanes = self.registry.iter().filter_map(|provider| match requests.get(provider.id()) {
            Some(SourceQuery::Request(request)) => {
                let entry = entries.get(provider.id()).cloned();
                Some(self.search_lane(generation, &key, provider.as_ref(), request, entry))
            }
            _ => None,
        });
        join_all(lanes).await;

        let mut state = self.state.lock().await;
        if self.is_current(generation) {
            state.searching = false;
            self.publish(generation, &state);
            tracing::info!(query = %key, generation, "search settled");
        }
        self.view_tx.borrow().clone()
    }

    async fn search_lane(
        &self, generation: u64, key: &QueryKey, provider: &dyn Provider, request: &str, entry: Option<Arc<CacheEntry>>,
    ) {
        let rendered = HashSet::new();
        let outcome = reveal(RevealRequest {
            provider,
            entry: entry.as_deref(),
            request,
            rendered: &rendered,
            page_size: self.config.page_size,
        })
        .await;

        let mut state = self.state.lock().await;
        if !self.is_current(generation) {
            tracing::debug!(source = provider.id(), generation, "discarding superseded lane outcome");
            return;
        }

        let source_id = provider.id();
        match outcome {
            Ok(revealed) => {
                self.store.update(key, source_id, revealed.patch.clone()).await;
                if let Some(lane) = state.lane_mut(source_id) {
                    lane.settle_search(&revealed);
                }
            }
            Err(e) => {
                tracing::warn!(source = source_id, query = %key, "source failed: {}", e);
                if let Some(lane) = state.lane_mut(source_id) {
                    lane.fail_search(e);
                }
            }
        }
        self.publish(generation, &state);
    }

    /// Reveal the next batch for one source.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownSource` if no provider has that id.
    pub async fn load_more(&self, source_id: &str) -> Result<LoadMore, Error> {
        let provider = self
            .registry
            .get(source_id)
            .ok_or_else(|| Error::UnknownSource(source_id.to_string()))?;

        let (generation, key, request, rendered) = {
            let mut state = self.state.lock().await;
            let Some(active) = state.active.clone() else {
                return Ok(LoadMore::Skipped);
            };
            let Some(SourceQuery::Request(request)) = active.requests.get(source_id).cloned() else {
                return Ok(LoadMore::Skipped);
            };
            let Some(lane) = state.lane_mut(source_id) else {
                return Ok(LoadMore::Skipped);
            };
            if !lane.can_load_more() {
                tracing::debug!(source = source_id, "load more skipped");
                return Ok(LoadMore::Skipped);
            }
            lane.is_loading_more = true;
            let rendered = lane.rendered();
            self.publish(active.generation, &state);
            (active.generation, active.key, request, rendered)
        };

        let entry = self.store.get_entry(&key, source_id).await;
        let outcome = reveal(RevealRequest {
            provider: provider.as_ref(),
            entry: entry.as_deref(),
            request: &request,
            rendered: &rendered,
            page_size: self.config.page_size,
        })
        .await;

        let mut state = self.state.lock().await;
        if !self.is_current(generation) {
            tracing::debug!(source = source_id, generation, "discarding superseded load more");
            return Ok(LoadMore::Superseded);
        }

        let result = match outcome {
            Ok(revealed) => {
                self.store.update(&key, source_id, revealed.patch.clone()).await;
                if let Some(lane) = state.lane_mut(source_id) {
                    lane.settle_more(&revealed);
                }
                LoadMore::Revealed { items: revealed.items, has_more: revealed.has_more }
            }
            Err(e) => {
                tracing::warn!(source = source_id, query = %key, "load more failed: {}", e);
                if let Some(lane) = state.lane_mut(source_id) {
                    lane.fail_more(e.clone());
                }
                LoadMore::Failed { error: e }
            }
        };
        self.publish(generation, &state);
        Ok(result)
    }

    /// Flag a rendered item as saved. Returns whether the item was found.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownSource` if no provider has that id.
    pub async fn mark_saved(&self, source_id: &str, url: &str) -> Result<bool, Error> {
        if self.registry.get(source_id).is_none() {
            return Err(Error::UnknownSource(source_id.to_string()));
        }
        let target = canonical_url(url).unwrap_or_else(|_| url.trim().to_string());

        let mut state = self.state.lock().await;
        let Some(item) = state
            .lane_mut(source_id)
            .and_then(|lane| lane.results.iter_mut().find(|r| r.item.canonical_url == target))
        else {
            return Ok(false);
        };
        item.is_saved = true;

        let generation = state.active.as_ref().map(|a| a.generation).unwrap_or(0);
        self.publish(generation, &state);
        Ok(true)
    }

    /// Sweep expired cache entries on demand.
    pub async fn sweep(&self) -> Swept {
        self.store.sweep_expired().await
    }

    /// Wait for pending cache writes. Call before exiting.
    pub async fn close(&self) {
        self.store.flush().await;
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn publish(&self, generation: u64, state: &SessionState) {
        self.view_tx.send_replace(SessionView {
            query: state.query.clone(),
            generation,
            searching: state.searching,
            lanes: state.lanes.clone(),
        });
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish()
    }
}
