//! Build the provider registry from configuration.

use std::sync::Arc;

use trawl_core::{AppConfig, CacheDb, CacheStore, Error, ProviderRegistry, Session};

use crate::brave::{BraveClient, BraveConfig};
use crate::feed::JsonFeedProvider;

/// Register the Brave web lane (when enabled) followed by every enabled feed,
/// in configuration order.
///
/// A missing Brave key does not prevent registration; the lane reports
/// `NotConfigured` when searched.
///
/// # Errors
///
/// Returns `Error::ClientBuild` if an HTTP client cannot be built, or
/// `Error::DuplicateSource` if two sources share an id.
pub fn build_registry(config: &AppConfig) -> Result<ProviderRegistry, Error> {
    let mut registry = ProviderRegistry::new();

    if config.brave_enabled {
        let brave = BraveClient::new(BraveConfig::from_app(config)).map_err(|e| Error::ClientBuild(e.to_string()))?;
        if config.brave_api_key.is_none() {
            tracing::warn!("TRAWL_BRAVE_API_KEY not set; the web lane will report NotConfigured");
        }
        registry.register(Arc::new(brave))?;
    }

    for feed in config.feeds.iter().filter(|f| f.enabled) {
        let provider = JsonFeedProvider::new(feed.clone(), &config.user_agent, config.timeout())
            .map_err(|e| Error::ClientBuild(format!("feed '{}': {e}", feed.id)))?;
        registry.register(Arc::new(provider))?;
    }

    tracing::info!(sources = ?registry.ids(), "provider registry ready");
    Ok(registry)
}

/// Open the SQLite cache at `config.db_path`, build the registry and start a
/// session over both.
///
/// # Errors
///
/// Returns any error from opening the database or building the registry.
pub async fn open_session(config: &AppConfig) -> Result<Session, Error> {
    let db = CacheDb::open(&config.db_path).await?;
    let store = Arc::new(CacheStore::with_backend(config.cache_ttl(), Arc::new(db)));
    let registry = build_registry(config)?;
    Ok(Session::start(registry, store, config.session_config()).await)
}
