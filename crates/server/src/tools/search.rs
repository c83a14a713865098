//! search and search_entity tool implementations.
//!
//! Both start a new search across every source and return the session view
//! once all lanes have settled.

use std::collections::HashMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use trawl_core::Session;
use trawl_core::query::{CuratedEntity, SourceBinding};

use super::json_result;

/// Input parameters for the search tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Free-text query. Surrounding whitespace is ignored; must not be empty.
    pub query: String,
}

/// A curated subject to search instead of free text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct EntityParams {
    /// Stable entity identifier.
    pub id: String,

    /// Default display name, used when no alias matches the language.
    pub name: String,

    /// Localized display names keyed by language tag (e.g. "de", "pt-BR").
    #[serde(default)]
    pub aliases: HashMap<String, String>,

    /// Source-specific search terms keyed by source id.
    #[serde(default)]
    pub slugs: HashMap<String, String>,

    /// Source ids the entity has no content on. These lanes are not queried.
    #[serde(default)]
    pub unavailable_on: Vec<String>,
}

impl From<EntityParams> for CuratedEntity {
    fn from(params: EntityParams) -> Self {
        let mut sources: HashMap<String, SourceBinding> = params
            .slugs
            .into_iter()
            .map(|(source, slug)| (source, SourceBinding::Slug(slug)))
            .collect();
        for source in params.unavailable_on {
            sources.insert(source, SourceBinding::Unavailable);
        }

        CuratedEntity { id: params.id, name: params.name, aliases: params.aliases, sources }
    }
}

/// Input parameters for the search_entity tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchEntityParams {
    pub entity: EntityParams,

    /// Language tag for alias lookup; defaults to the configured language.
    #[serde(default)]
    pub language: Option<String>,
}

/// Implementation of the search tool.
pub async fn search_impl(session: &Session, params: SearchParams) -> Result<CallToolResult, McpError> {
    let view = session.search(&params.query).await?;
    json_result(&view)
}

/// Implementation of the search_entity tool.
pub async fn search_entity_impl(session: &Session, params: SearchEntityParams) -> Result<CallToolResult, McpError> {
    let entity = CuratedEntity::from(params.entity);
    let view = session.search_entity(&entity, params.language.as_deref()).await?;
    json_result(&view)
}
