//! Per-query result cache.
//!
//! - [`CacheEntry`]: accumulated, deduplicated results plus pagination state
//!   for one `(query, source)` pair
//! - [`CacheStore`]: TTL-bounded, injectable store that merges entry patches
//!   and persists them in the background
//! - [`CacheDb`]: SQLite [`CacheBackend`] via tokio-rusqlite (WAL mode,
//!   versioned migrations)

pub mod connection;
pub mod entries;
pub mod entry;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entry::{CacheEntry, EntryPatch};
pub use store::{CacheBackend, CacheStats, CacheStore, DEFAULT_TTL_SECS, Swept};
