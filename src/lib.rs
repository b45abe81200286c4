pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod state;
pub mod upstream;

use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;

use crate::state::AppState;

// creating the router with routes
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/generate", post(handlers::generate_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(state)
}
