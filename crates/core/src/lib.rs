//! Core types and shared functionality for trawl.
//!
//! This crate provides:
//! - Query normalization and curated entity resolution
//! - The provider contract, cursor variants and registry
//! - Per-query result cache with SQLite persistence
//! - The reveal engine and the search session that drives it
//! - Unified error types and configuration

pub mod cache;
pub mod config;
pub mod cursor;
pub mod error;
pub mod item;
pub mod provider;
pub mod query;
pub mod reveal;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{CacheDb, CacheEntry, CacheStore};
pub use config::{AppConfig, ConfigError};
pub use cursor::Cursor;
pub use error::{Error, SourceError};
pub use item::ResultItem;
pub use provider::{Page, Provider, ProviderRegistry};
pub use query::{CuratedEntity, NormalizedQuery, QueryKey};
pub use session::{LoadMore, Session, SessionConfig, SessionView};
