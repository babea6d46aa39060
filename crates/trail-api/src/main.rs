//! Trail API Server
//!
//! REST API server for the page-view browsing graph.
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;
use trail_api::{create_router, state::AppState};
use trail_core::config::{AppConfig, LoggingConfig};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("trail_api={0},trail_graph={0},tower_http=debug", logging.level).into()
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration: TRAIL_CONFIG file first, environment on top
    let config = match std::env::var("TRAIL_CONFIG") {
        Ok(path) => AppConfig::from_file(path)?.with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };

    init_tracing(&config.logging);

    let store = trail_graph::connect(&config.database).await?;
    tracing::info!(backend = store.name(), "Graph store connected");

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create application state
    let state = Arc::new(AppState::new(config, store));

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Trail API Server starting on http://{}", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
