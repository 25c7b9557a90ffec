//! Route assembly and middleware stack.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use wallpaper_core::Config;

use crate::handlers::{health, upload};
use crate::state::AppState;

pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/upload", post(upload::upload))
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .layer(RequestBodyLimitLayer::new(config.max_file_size_bytes() as usize))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
