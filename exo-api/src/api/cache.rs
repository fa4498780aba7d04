//! Out-of-band cache control

use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

use crate::cache::CacheStatus;
use crate::AppState;

/// POST /api/cache/invalidate
///
/// Drops the cached dataset; the next listing request re-fetches upstream.
pub async fn invalidate_cache(State(state): State<AppState>) -> Json<CacheStatus> {
    info!("Cache invalidation requested");
    let cache = state.pipeline.cache();
    cache.invalidate().await;
    Json(cache.status().await)
}

/// Build cache control routes
pub fn cache_routes() -> Router<AppState> {
    Router::new().route("/api/cache/invalidate", post(invalidate_cache))
}
