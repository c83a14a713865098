//! cache_stats tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;
use trawl_core::Session;
use trawl_core::cache::CacheStats;

use crate::tools::json_result;

/// Output from the cache_stats tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsOutput {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub ttl_secs: i64,
}

/// Implementation of the cache_stats tool.
pub async fn stats_impl(session: &Session) -> Result<CallToolResult, McpError> {
    let store = session.store();
    let output = CacheStatsOutput { stats: store.stats().await, ttl_secs: store.ttl().num_seconds() };
    json_result(&output)
}
