//! MCP tool implementations.
//!
//! Every tool returns its output as pretty-printed JSON text.

pub mod cache;
pub mod lanes;
pub mod search;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

pub use cache::{stats_impl, sweep_impl};
pub use lanes::{LoadMoreParams, MarkSavedParams, lanes_impl, load_more_impl, mark_saved_impl};
pub use search::{SearchEntityParams, SearchParams, search_entity_impl, search_impl};

fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| McpError::internal_error(format!("failed to serialize output: {e}"), None))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
