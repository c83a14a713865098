//! Provider adapter contract and registry.
//!
//! A provider hides one source's pagination idiom behind [`Provider::fetch_page`].
//! The orchestrator only sees providers through a [`ProviderRegistry`].

use std::sync::Arc;
use std::time::Duration;

use crate::cursor::Cursor;
use crate::error::SourceError;
use crate::item::ResultItem;
use crate::Error;

/// Default per-call timeout for slow sources.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// One page of results from a source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<ResultItem>,
    pub has_more: bool,
    pub next_cursor: Option<Cursor>,
}

/// Uniform "fetch next page" contract for a content source.
///
/// Implementations must not mutate state shared with other providers.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Source id, unique within a registry.
    fn id(&self) -> &str;

    /// Upper bound on one `fetch_page` call.
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Whether a leading `#` should be removed from the request text.
    fn strips_hashtag(&self) -> bool {
        false
    }

    /// Fetch the page at `cursor`, or the first page when `cursor` is `None`.
    async fn fetch_page(&self, query: &str, cursor: Option<&Cursor>) -> Result<Page, SourceError>;
}

/// Source id to provider mapping, in registration order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateSource` if the id is already taken.
    pub fn register(&mut self, provider: Arc<dyn Provider>) -> Result<(), Error> {
        if self.get(provider.id()).is_some() {
            return Err(Error::DuplicateSource(provider.id().to_string()));
        }
        tracing::debug!(source = provider.id(), "registered provider");
        self.providers.push(provider);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.id().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry").field("sources", &self.ids()).finish()
    }
}
