//! edge-cache server entry point.
//!
//! Boots the cache manager for the configured version, installs and
//! activates it, then serves MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use edge_cache_client::{CacheManager, FetchConfig, HttpFetcher};
use edge_cache_core::{AppConfig, CacheStore};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

mod error;
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
    tracing::info!(version = %config.version, db = %config.db_path.display(), "starting edge-cache server on stdio transport");

    let store = CacheStore::open(&config.db_path).await?;
    let fetcher = HttpFetcher::new(FetchConfig::from(&config))?;
    let manager = Arc::new(CacheManager::new(&config, store, Arc::new(fetcher))?);

    let mut updates = manager.subscribe();
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => tracing::info!(?update, "broadcast to clients"),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "broadcast listener lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let installed = manager.handle_install().await?;
    if !installed.failed.is_empty() {
        tracing::warn!(failed = ?installed.failed, "install finished with unwarmed precache entries");
    }
    manager.handle_activate().await?;

    let handler = handler::EdgeCacheServer::new(manager);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
