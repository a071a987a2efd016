//! Trellis MCP server binary.
//!
//! Runs the MCP server over stdio. Logging goes to stderr; stdout
//! belongs to the protocol stream.

use std::sync::Arc;

use anyhow::Context as _;
use tracing_subscriber::EnvFilter;
use trellis_github::GithubClient;
use trellis_mcp::{Config, TrellisServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Configuration problems are fatal before any session begins.
    let config = Config::from_env().context("reading configuration")?;

    tracing::info!("Starting trellis-mcp server");

    let client = GithubClient::new(&config.github()).context("building GitHub client")?;
    let server = TrellisServer::new(Arc::new(client));
    trellis_mcp::serve_stdio(server).await;

    tracing::info!("Session closed, shutting down");
    Ok(())
}
