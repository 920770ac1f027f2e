use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

mod clients;
mod config;
mod error;
mod logging;
mod models;
mod routes;
mod services;

use services::{ProviderChain, SheetAnalyzer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging()?;

    // Load configuration
    let config = config::Config::from_env()?;

    // Build our application state
    let state = Arc::new(AppState::new(config));

    let app = Router::new()
        .merge(routes::routes())
        .merge(routes::sheets::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr = state.config.bind_addr;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// Application state
pub struct AppState {
    config: config::Config,
    analyzer: SheetAnalyzer,
    http: reqwest::Client,
}

impl AppState {
    fn new(config: config::Config) -> Self {
        let chain = ProviderChain::from_config(&config);
        if chain.is_empty() {
            tracing::warn!("No AI provider configured; every analysis will use the heuristic fallback");
        } else {
            tracing::info!("{} AI provider(s) configured", chain.len());
        }

        Self {
            analyzer: SheetAnalyzer::new(chain),
            http: reqwest::Client::new(),
            config,
        }
    }
}
