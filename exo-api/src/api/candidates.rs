//! Candidate listing endpoints
//!
//! - `GET /api/coordinates?limit=10`: sky position + unit-sphere projection
//! - `GET /api/candidates?limit=5`: coordinates plus classification
//! - `GET /api/star-vertices?limit=1000&scale=100`: flat point cloud
//!
//! A negative `limit` behaves like 0.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::pipeline::{CoordinateRow, EnrichedCandidate, DEFAULT_VERTEX_SCALE};
use crate::AppState;

const DEFAULT_COORDINATE_LIMIT: i64 = 10;
const DEFAULT_CANDIDATE_LIMIT: i64 = 5;
const DEFAULT_VERTEX_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct VertexQuery {
    pub limit: Option<i64>,
    pub scale: Option<f64>,
}

fn clamp_limit(limit: Option<i64>, default: i64) -> usize {
    limit.unwrap_or(default).max(0) as usize
}

/// GET /api/coordinates
pub async fn get_coordinates(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<CoordinateRow>>> {
    let Query(query) = query?;
    let limit = clamp_limit(query.limit, DEFAULT_COORDINATE_LIMIT);
    Ok(Json(state.pipeline.coordinates(limit).await))
}

/// GET /api/candidates
pub async fn get_enriched_candidates(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<EnrichedCandidate>>> {
    let Query(query) = query?;
    let limit = clamp_limit(query.limit, DEFAULT_CANDIDATE_LIMIT);
    Ok(Json(state.pipeline.enrich(limit).await))
}

/// GET /api/star-vertices
pub async fn get_star_vertices(
    State(state): State<AppState>,
    query: Result<Query<VertexQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<f64>>> {
    let Query(query) = query?;
    let scale = query.scale.unwrap_or(DEFAULT_VERTEX_SCALE);
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ApiError::BadRequest(format!("scale must be a positive number, got {}", scale)));
    }
    let limit = clamp_limit(query.limit, DEFAULT_VERTEX_LIMIT);
    Ok(Json(state.pipeline.star_vertices(limit, scale).await))
}

/// Build candidate listing routes
pub fn candidate_routes() -> Router<AppState> {
    Router::new()
        .route("/api/coordinates", get(get_coordinates))
        .route("/api/candidates", get(get_enriched_candidates))
        .route("/api/star-vertices", get(get_star_vertices))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None, 5), 5);
        assert_eq!(clamp_limit(Some(-3), 5), 0);
        assert_eq!(clamp_limit(Some(0), 5), 0);
        assert_eq!(clamp_limit(Some(12), 5), 12);
    }
}
