//! bracketeer-admin entry point.
//!
//! Boots the cache-admin MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use bracketeer_client::{CachedApi, TrueFinalsClient, TrueFinalsConfig};
use bracketeer_core::{AppConfig, CacheDb};
use bracketeer_server::{AdminServer, init_tracing};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load()?;
    let db = CacheDb::open(&config.db_path).await?;
    let client = TrueFinalsClient::new(TrueFinalsConfig::from_app_config(&config))?;
    let api = CachedApi::from_config(db, Arc::new(client), &config);

    tracing::info!("Starting bracketeer-admin on stdio transport");

    let handler = AdminServer::new(api, config);
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    Ok(())
}
