use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

use crate::state::AppState;

// health handler, reports whether the cache backend answers
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cache = state.cache();
    Json(serde_json::json!({
        "status": "healthy",
        "cache": cache.provider_name(),
        "cache_ok": cache.is_healthy().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
