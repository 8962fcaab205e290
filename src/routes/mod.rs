use std::sync::Arc;

use axum::{http::Method, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::AppState;

pub mod analyses;
pub mod uploads;

pub fn routes() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_check))
        .merge(uploads::routes())
        .merge(analyses::routes())
        .layer(cors)
}

async fn health_check() -> &'static str {
    "OK"
}
