//! Lane tools: load_more, lanes and mark_saved.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use trawl_core::{LoadMore, Session};

use super::json_result;

/// Input parameters for the load_more tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoadMoreParams {
    /// Source id of the lane to extend (see the lanes tool).
    pub source: String,
}

/// Output from the load_more tool.
#[derive(Debug, Clone, Serialize)]
pub struct LoadMoreOutput {
    pub source: String,
    #[serde(flatten)]
    pub outcome: LoadMore,
}

/// Input parameters for the mark_saved tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MarkSavedParams {
    pub source: String,

    /// URL of a shown result. Compared after canonicalization.
    pub url: String,
}

/// Output from the mark_saved tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MarkSavedOutput {
    /// False when the lane does not currently show that URL.
    pub saved: bool,
}

/// Implementation of the load_more tool.
pub async fn load_more_impl(session: &Session, params: LoadMoreParams) -> Result<CallToolResult, McpError> {
    let outcome = session.load_more(&params.source).await?;
    json_result(&LoadMoreOutput { source: params.source, outcome })
}

/// Implementation of the lanes tool.
pub fn lanes_impl(session: &Session) -> Result<CallToolResult, McpError> {
    json_result(&session.view())
}

/// Implementation of the mark_saved tool.
pub async fn mark_saved_impl(session: &Session, params: MarkSavedParams) -> Result<CallToolResult, McpError> {
    let saved = session.mark_saved(&params.source, &params.url).await?;
    json_result(&MarkSavedOutput { saved })
}
