//! trawl MCP server entry point.
//!
//! Boots a search session from configuration and serves it over stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use trawl_core::AppConfig;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let session = trawl_client::open_session(&config).await?;

    tracing::info!(sources = ?session.registry().ids(), db = %config.db_path.display(), "Starting trawl-mcp on stdio transport");

    let session = Arc::new(session);
    let handler = handler::TrawlServer::new(Arc::clone(&session));
    let server = serve_server(handler, stdio()).await?;

    let stopped = server.waiting().await;
    session.close().await;
    stopped?;

    Ok(())
}
