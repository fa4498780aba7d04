//! Single-record prediction endpoint
//!
//! `POST /api/predict` with a JSON object of raw feature values. Unknown
//! fields are ignored and missing ones imputed.
//!
//! - 400 when the body is absent, not JSON, not an object, or empty
//! - 503 when no model is loaded

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use exo_common::CandidateRecord;

use crate::error::{ApiError, ApiResult};
use crate::model::PredictionResult;
use crate::AppState;

/// POST /api/predict
pub async fn predict_one(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> ApiResult<Json<PredictionResult>> {
    let Json(value) = body?;
    let record = match value {
        serde_json::Value::Object(map) => CandidateRecord::from(map),
        _ => {
            return Err(ApiError::BadRequest(
                "request body must be a JSON object of feature values".to_string(),
            ))
        }
    };

    let result = state.pipeline.predict_one(&record)?;
    Ok(Json(result))
}

/// Build prediction routes
pub fn predict_routes() -> Router<AppState> {
    Router::new().route("/api/predict", post(predict_one))
}
