//! TTL-bounded query cache with optional persistence.
//!
//! [`CacheStore`] keeps the authoritative per-query entries in memory and
//! mirrors every merge to a [`CacheBackend`] on a spawned task, so searches
//! never wait on (or fail because of) persistence. Entries are held as
//! `Arc<CacheEntry>` and replaced whole: a reader sees an entry before or after
//! a merge or sweep, never halfway.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinSet;

use super::entry::{CacheEntry, EntryPatch};
use crate::Error;
use crate::query::QueryKey;

/// Default TTL horizon.
pub const DEFAULT_TTL_SECS: i64 = 24 * 60 * 60;

/// Persistence seam behind the cache store.
#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    /// Every persisted entry for `query_key`, expired or not.
    async fn load(&self, query_key: &str) -> Result<HashMap<String, CacheEntry>, Error>;

    /// Persist `entry`, ignoring it if a newer write for the same key already landed.
    async fn store(&self, query_key: &str, source_id: &str, entry: &CacheEntry) -> Result<(), Error>;

    /// Delete entries last updated before `cutoff`. Returns the number deleted.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, Error>;
}

type SourceEntries = HashMap<String, Arc<CacheEntry>>;

/// Outcome of [`CacheStore::sweep_expired`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Swept {
    pub in_memory: usize,
    pub persisted: u64,
}

/// Counts over the in-memory cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub queries: usize,
    pub entries: usize,
    pub items: usize,
}

/// Keyed, TTL-bounded store of per-(query, source) cache entries.
pub struct CacheStore {
    ttl: Duration,
    entries: RwLock<HashMap<QueryKey, SourceEntries>>,
    backend: Option<Arc<dyn CacheBackend>>,
    /// Backend writes not yet awaited by [`CacheStore::flush`].
    writes: Mutex<JoinSet<()>>,
}

impl CacheStore {
    /// A store with no persistence.
    pub fn in_memory(ttl: Duration) -> Self {
        Self { ttl, entries: RwLock::new(HashMap::new()), backend: None, writes: Mutex::default() }
    }

    /// A store mirrored to `backend`.
    pub fn with_backend(ttl: Duration, backend: Arc<dyn CacheBackend>) -> Self {
        Self { ttl, entries: RwLock::new(HashMap::new()), backend: Some(backend), writes: Mutex::default() }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entries for `key`, keyed by source id. Empty when nothing is cached.
    ///
    /// On first access for a key the backend is consulted; persistence
    /// failures degrade to an empty result.
    pub async fn get(&self, key: &QueryKey) -> HashMap<String, Arc<CacheEntry>> {
        let now = Utc::now();

        {
            let map = self.entries.read().await;
            if let Some(sources) = map.get(key) {
                return self.fresh(sources, now);
            }
        }

        let Some(backend) = &self.backend else {
            return HashMap::new();
        };

        let loaded = match backend.load(key.as_str()).await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(query = %key, "failed to load cache entries: {}", e);
                return HashMap::new();
            }
        };

        let mut map = self.entries.write().await;
        let sources = map.entry(key.clone()).or_default();
        for (source_id, entry) in loaded {
            if !entry.is_expired(now, self.ttl) {
                sources.entry(source_id).or_insert_with(|| Arc::new(entry));
            }
        }
        tracing::debug!(query = %key, sources = sources.len(), "loaded cache entries from backend");
        self.fresh(sources, now)
    }

    /// Fresh entry for one source.
    pub async fn get_entry(&self, key: &QueryKey, source_id: &str) -> Option<Arc<CacheEntry>> {
        self.get(key).await.remove(source_id)
    }

    /// Merge `patch` into the entry for `(key, source_id)`, creating it if absent.
    ///
    /// The merge is visible to the next `get` as soon as this returns; the
    /// backend write happens in the background and a failure is only logged.
    /// [`CacheStore::flush`] waits for it.
    pub async fn update(&self, key: &QueryKey, source_id: &str, patch: EntryPatch) -> Arc<CacheEntry> {
        let now = Utc::now();

        let merged = {
            let mut map = self.entries.write().await;
            let sources = map.entry(key.clone()).or_default();

            let mut entry = match sources.get(source_id) {
                Some(existing) if !existing.is_expired(now, self.ttl) => (**existing).clone(),
                Some(expired) => {
                    let mut fresh = CacheEntry::new(now);
                    fresh.revision = expired.revision;
                    fresh
                }
                None => CacheEntry::new(now),
            };
            entry.apply(patch, now);

            let merged = Arc::new(entry);
            sources.insert(source_id.to_string(), Arc::clone(&merged));
            merged
        };

        if let Some(backend) = self.backend.clone() {
            let key = key.clone();
            let source_id = source_id.to_string();
            let entry = Arc::clone(&merged);
            let mut writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
            while writes.try_join_next().is_some() {}
            writes.spawn(async move {
                if let Err(e) = backend.store(key.as_str(), &source_id, &entry).await {
                    tracing::warn!(query = %key, source = %source_id, "failed to persist cache entry: {}", e);
                }
            });
        }

        merged
    }

    /// Wait for every pending backend write. Call before the runtime shuts
    /// down, or the last writes are lost.
    pub async fn flush(&self) {
        let mut pending = std::mem::take(&mut *self.writes.lock().unwrap_or_else(PoisonError::into_inner));
        let count = pending.len();
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("cache write task failed: {}", e);
            }
        }
        if count > 0 {
            tracing::debug!(writes = count, "flushed cache writes");
        }
    }

    /// Remove entries older than the TTL horizon, in memory and in the backend.
    pub async fn sweep_expired(&self) -> Swept {
        let now = Utc::now();
        let mut swept = Swept::default();

        {
            let mut map = self.entries.write().await;
            for sources in map.values_mut() {
                let before = sources.len();
                sources.retain(|_, entry| !entry.is_expired(now, self.ttl));
                swept.in_memory += before - sources.len();
            }
            map.retain(|_, sources| !sources.is_empty());
        }

        if let Some(backend) = &self.backend {
            match backend.purge_older_than(now - self.ttl).await {
                Ok(count) => swept.persisted = count,
                Err(e) => tracing::warn!("failed to purge expired cache entries: {}", e),
            }
        }

        if swept.in_memory > 0 || swept.persisted > 0 {
            tracing::info!(in_memory = swept.in_memory, persisted = swept.persisted, "swept expired cache entries");
        }

        swept
    }

    pub async fn stats(&self) -> CacheStats {
        let map = self.entries.read().await;
        CacheStats {
            queries: map.len(),
            entries: map.values().map(HashMap::len).sum(),
            items: map.values().flat_map(|s| s.values()).map(|e| e.results.len()).sum(),
        }
    }

    fn fresh(&self, sources: &SourceEntries, now: DateTime<Utc>) -> HashMap<String, Arc<CacheEntry>> {
        sources
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now, self.ttl))
            .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
            .collect()
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("ttl", &self.ttl)
            .field("persistent", &self.backend.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheDb;
    use crate::item::ResultItem;
    use crate::query::normalize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn item(n: usize) -> ResultItem {
        ResultItem::new("web", &format!("https://example.com/{n}"), format!("Item {n}")).unwrap()
    }

    fn key(q: &str) -> QueryKey {
        normalize(q).unwrap().key().clone()
    }

    /// Backend that records writes and can be told to fail.
    #[derive(Default)]
    struct RecordingBackend {
        rows: Mutex<HashMap<(String, String), CacheEntry>>,
        stores: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl CacheBackend for RecordingBackend {
        async fn load(&self, query_key: &str) -> Result<HashMap<String, CacheEntry>, Error> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .filter(|((q, _), _)| q == query_key)
                .map(|((_, s), e)| (s.clone(), e.clone()))
                .collect())
        }

        async fn store(&self, query_key: &str, source_id: &str, entry: &CacheEntry) -> Result<(), Error> {
            self.stores.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::MigrationFailed("disk full".into()));
            }
            self.rows
                .lock()
                .unwrap()
                .insert((query_key.to_string(), source_id.to_string()), entry.clone());
            Ok(())
        }

        async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|_, e| e.updated_at >= cutoff);
            Ok((before - rows.len()) as u64)
        }
    }

    #[tokio::test]
    async fn test_get_empty() {
        let store = CacheStore::in_memory(Duration::hours(24));
        assert!(store.get(&key("rust")).await.is_empty());
    }

    #[tokio::test]
    async fn test_update_creates_and_merges() {
        let store = CacheStore::in_memory(Duration::hours(24));
        let k = key("rust");

        store
            .update(&k, "web", EntryPatch { append: vec![item(1), item(2)], ..Default::default() })
            .await;
        store.update(&k, "web", EntryPatch::displayed(1)).await;

        let entries = store.get(&k).await;
        let entry = entries.get("web").unwrap();
        assert_eq!(entry.results.len(), 2);
        assert_eq!(entry.displayed_count, 1);
        assert!(store.get(&key("python")).await.is_empty());
    }

    #[tokio::test]
    async fn test_update_with_existing_url_is_idempotent() {
        let store = CacheStore::in_memory(Duration::hours(24));
        let k = key("rust");
        store.update(&k, "web", EntryPatch { append: vec![item(1)], ..Default::default() }).await;
        let merged = store.update(&k, "web", EntryPatch { append: vec![item(1)], ..Default::default() }).await;
        assert_eq!(merged.results.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_absent_and_swept() {
        let store = CacheStore::in_memory(Duration::milliseconds(50));
        let k = key("rust");
        store.update(&k, "web", EntryPatch { append: vec![item(1)], ..Default::default() }).await;
        assert_eq!(store.get(&k).await.len(), 1);

        tokio::time::sleep(std::time::Duration::from_millis(120)).await;

        assert!(store.get(&k).await.is_empty());
        let swept = store.sweep_expired().await;
        assert_eq!(swept.in_memory, 1);
        assert_eq!(store.stats().await, CacheStats::default());
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_entries() {
        let store = CacheStore::in_memory(Duration::hours(24));
        store.update(&key("rust"), "web", EntryPatch { append: vec![item(1)], ..Default::default() }).await;
        let swept = store.sweep_expired().await;
        assert_eq!(swept, Swept::default());
        assert_eq!(store.stats().await, CacheStats { queries: 1, entries: 1, items: 1 });
    }

    #[tokio::test]
    async fn test_update_persists_in_background() {
        let backend = Arc::new(RecordingBackend::default());
        let store = CacheStore::with_backend(Duration::hours(24), backend.clone());
        let k = key("rust");

        store.update(&k, "web", EntryPatch { append: vec![item(1)], ..Default::default() }).await;
        store.flush().await;
        assert_eq!(backend.stores.load(Ordering::SeqCst), 1);

        let fresh_store = CacheStore::with_backend(Duration::hours(24), backend.clone());
        let loaded = fresh_store.get(&k).await;
        assert_eq!(loaded.get("web").unwrap().results.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_persist_does_not_fail_update() {
        let backend = Arc::new(RecordingBackend { fail: true, ..Default::default() });
        let store = CacheStore::with_backend(Duration::hours(24), backend);
        let k = key("rust");

        let merged = store.update(&k, "web", EntryPatch { append: vec![item(1)], ..Default::default() }).await;
        assert_eq!(merged.results.len(), 1);
        assert_eq!(store.get(&k).await.get("web").unwrap().results.len(), 1);
    }

    #[tokio::test]
    async fn test_backend_rows_past_ttl_are_not_adopted() {
        let backend = Arc::new(RecordingBackend::default());
        let stale = CacheEntry { results: vec![item(1)], ..CacheEntry::new(Utc::now() - Duration::hours(30)) };
        backend
            .rows
            .lock()
            .unwrap()
            .insert(("rust".to_string(), "web".to_string()), stale);

        let store = CacheStore::with_backend(Duration::hours(24), backend.clone());
        assert!(store.get(&key("rust")).await.is_empty());

        let swept = store.sweep_expired().await;
        assert_eq!(swept.persisted, 1);
    }

    #[tokio::test]
    async fn test_flush_persists_displayed_count_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");
        let k = key("rust");

        {
            let db = CacheDb::open(&path).await.unwrap();
            let store = CacheStore::with_backend(Duration::hours(24), Arc::new(db));
            store
                .update(&k, "web", EntryPatch { append: (0..8).map(item).collect(), ..Default::default() })
                .await;
            store.update(&k, "web", EntryPatch::displayed(6)).await;
            store.flush().await;
        }

        let reopened = CacheStore::with_backend(Duration::hours(24), Arc::new(CacheDb::open(&path).await.unwrap()));
        let entry = reopened.get_entry(&k, "web").await.unwrap();
        assert_eq!(entry.results.len(), 8);
        assert_eq!(entry.displayed_count, 6);
    }

    #[tokio::test]
    async fn test_flush_without_backend_is_a_no_op() {
        let store = CacheStore::in_memory(Duration::hours(24));
        store.update(&key("rust"), "web", EntryPatch { append: vec![item(1)], ..Default::default() }).await;
        store.flush().await;
        assert_eq!(store.stats().await.items, 1);
    }
}
