//! cache_sweep tool implementation.
//!
//! Drops entries past the TTL horizon from memory and from SQLite.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use trawl_core::Session;

use crate::tools::json_result;

/// Implementation of the cache_sweep tool.
pub async fn sweep_impl(session: &Session) -> Result<CallToolResult, McpError> {
    json_result(&session.sweep().await)
}
