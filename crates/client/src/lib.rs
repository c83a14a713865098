//! HTTP provider adapters for trawl.
//!
//! This crate provides the concrete sources the search session fans out to:
//! Brave web search (page + offset) and configurable JSON feeds (page + offset,
//! token, cursor or watermark pagination), plus the registry builder shared by
//! the server and CLI.

pub mod brave;
pub mod feed;
pub mod registry;

pub use brave::{BraveClient, BraveConfig, BraveError};
pub use feed::{FeedError, JsonFeedProvider};
pub use registry::{build_registry, open_session};
