//! swcache server entry point.
//!
//! Boots the MCP server on stdio transport and registers the configured
//! cache version. Logging goes to stderr to avoid interfering with the
//! JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_client::{FetchClient, FetchConfig, Registration};
use swcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

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
    let origin = config.origin_url()?;
    tracing::info!(
        version = %config.cache_version,
        %origin,
        db_path = %config.db_path.display(),
        "Starting swcache server on stdio transport"
    );

    let cache = CacheDb::open(&config.db_path).await?;
    let network = FetchClient::new(FetchConfig::from_app(&config)?)?;
    let registration = Arc::new(Registration::new(cache, Arc::new(network)));

    match registration.register(&config).await {
        Ok(state) => tracing::info!(version = %config.cache_version, %state, "registered worker"),
        Err(e) => tracing::warn!(version = %config.cache_version, error = %e, "initial registration failed"),
    }

    let handler = handler::SwCacheServer::new(registration, config, origin);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
