use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

mod auth;
mod config;
mod error;
mod logging;
mod models;
mod routes;
mod services;

use services::storage::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging()?;

    // Load configuration
    let config = config::Config::new()?;
    std::fs::create_dir_all(&config.upload_dir)?;

    let store = SqliteStore::open(&config.database_path)?;

    // Build our application state
    let state = Arc::new(AppState::new(config.clone(), store));

    // Body limit leaves headroom for multipart framing around the file.
    let app = Router::new()
        .merge(routes::routes())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.max_upload_bytes + 64 * 1024))
        .with_state(state);

    tracing::info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// Application state
pub struct AppState {
    config: config::Config,
    store: SqliteStore,
}

impl AppState {
    fn new(config: config::Config, store: SqliteStore) -> Self {
        Self { config, store }
    }
}
