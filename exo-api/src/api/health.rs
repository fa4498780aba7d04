//! Health check endpoint
//!
//! Reports uptime, model availability and dataset cache state. The service
//! answers "degraded" rather than failing when the model is not loaded.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::cache::CacheStatus;
use crate::model::EngineState;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" with a loaded model, otherwise "degraded"
    pub status: String,
    pub module: String,
    pub version: String,
    pub build: String,
    pub uptime_seconds: u64,
    pub model: ModelHealth,
    pub cache: CacheStatus,
}

#[derive(Debug, Serialize)]
pub struct ModelHealth {
    pub state: String,
    pub features: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let engine = state.pipeline.engine();

    let model = ModelHealth {
        state: engine.state_name().to_string(),
        features: engine.required_schema().len(),
        error: match engine.state() {
            EngineState::Faulted(reason) => Some(reason.clone()),
            _ => None,
        },
    };

    Json(HealthResponse {
        status: if engine.is_loaded() { "ok" } else { "degraded" }.to_string(),
        module: "exo-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: env!("GIT_HASH").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        model,
        cache: state.pipeline.cache().status().await,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
