//! Reqtrace - HTTP request tracing server
//!
//! Records every request it receives into an in-memory log and serves a
//! small viewer over it:
//! - any request that is not a GET to /log is recorded and confirmed
//! - GET /log lists the recorded requests as clickable titles
//! - GET /log?id=<n> renders the full detail of one recorded request

mod config;
mod html;
mod server;
mod store;

use anyhow::Result;
use std::sync::Arc;
use store::RequestStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reqtrace=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env();
    tracing::info!("Starting reqtrace on port {}", config.port);

    let store = Arc::new(RequestStore::new());
    server::run(&config, store).await
}
