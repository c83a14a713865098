//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the shared search session.
use std::sync::Arc;

use crate::tools::{
    LoadMoreParams, MarkSavedParams, SearchEntityParams, SearchParams, lanes_impl, load_more_impl, mark_saved_impl,
    search_entity_impl, search_impl, stats_impl, sweep_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use trawl_core::Session;

/// The main MCP server handler for trawl.
#[derive(Clone)]
pub struct TrawlServer {
    session: Arc<Session>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl TrawlServer {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session, tool_router: Self::tool_router() }
    }

    /// Start a new search across every source.
    ///
    /// Replaces the current search. Lanes are served from the cache when the
    /// same query was searched recently.
    #[tool(description = "Search every source for a query. Returns one lane per source with its first results.")]
    async fn search(&self, params: Parameters<SearchParams>) -> Result<CallToolResult, McpError> {
        search_impl(&self.session, params.0).await
    }

    #[tool(
        description = "Search every source for a curated entity, using localized aliases and per-source slugs. Returns one lane per source."
    )]
    async fn search_entity(&self, params: Parameters<SearchEntityParams>) -> Result<CallToolResult, McpError> {
        search_entity_impl(&self.session, params.0).await
    }

    #[tool(
        description = "Reveal the next batch of results for one source of the current search. Returns the new items, or a status of skipped/failed/superseded."
    )]
    async fn load_more(&self, params: Parameters<LoadMoreParams>) -> Result<CallToolResult, McpError> {
        load_more_impl(&self.session, params.0).await
    }

    #[tool(description = "Show the current search: query, generation and the state of every lane.")]
    async fn lanes(&self) -> Result<CallToolResult, McpError> {
        lanes_impl(&self.session)
    }

    #[tool(description = "Mark a shown result as saved so it is displayed de-emphasized.")]
    async fn mark_saved(&self, params: Parameters<MarkSavedParams>) -> Result<CallToolResult, McpError> {
        mark_saved_impl(&self.session, params.0).await
    }

    #[tool(description = "Delete cache entries older than the configured TTL, in memory and on disk.")]
    async fn cache_sweep(&self) -> Result<CallToolResult, McpError> {
        sweep_impl(&self.session).await
    }

    #[tool(description = "Count cached queries, per-source entries and items.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.session).await
    }
}

impl ServerHandler for TrawlServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "trawl".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Call search (or search_entity) first, then load_more per source to page through results.".into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::session_with;
    use trawl_core::testing::ScriptedProvider;

    #[tokio::test]
    async fn test_tools_are_listed() {
        let session = session_with(vec![Arc::new(ScriptedProvider::new("web"))]).await;
        let server = TrawlServer::new(Arc::new(session));

        let mut names: Vec<_> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();

        assert_eq!(
            names,
            ["cache_stats", "cache_sweep", "lanes", "load_more", "mark_saved", "search", "search_entity"]
        );
    }

    #[tokio::test]
    async fn test_server_info() {
        let server = TrawlServer::new(Arc::new(session_with(vec![]).await));
        let info = server.get_info();
        assert_eq!(info.server_info.name, "trawl");
        assert!(info.capabilities.tools.is_some());
    }
}
