//! exo-api library - Kepler Object of Interest candidate service
//!
//! Serves KOI candidates fetched from the upstream catalogue, projected onto
//! the unit sphere and classified by a pre-trained model.

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod cache;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod upstream;

use pipeline::CandidateEnrichmentPipeline;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<CandidateEnrichmentPipeline>,
    /// Server startup time (for uptime reporting)
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: Arc<CandidateEnrichmentPipeline>) -> Self {
        Self {
            pipeline,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::candidate_routes())
        .merge(api::predict_routes())
        .merge(api::cache_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
