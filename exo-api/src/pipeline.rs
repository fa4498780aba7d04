//! Candidate enrichment pipeline
//!
//! Orchestrates fetch → coordinate transform → feature reconciliation →
//! inference, and hosts the query operations the HTTP layer exposes:
//! - [`CandidateEnrichmentPipeline::coordinates`]
//! - [`CandidateEnrichmentPipeline::enrich`]
//! - [`CandidateEnrichmentPipeline::predict_one`]
//! - [`CandidateEnrichmentPipeline::star_vertices`]

use exo_common::coordinates::transform_record;
use exo_common::CandidateRecord;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::cache::DatasetCache;
use crate::features::reconcile_with_warnings;
use crate::model::{InferenceEngine, PredictionResult};

/// Default multiplier applied by `star_vertices`
pub const DEFAULT_VERTEX_SCALE: f64 = 100.0;
/// Vertices with any component at or beyond this magnitude are discarded
pub const VERTEX_BOUND: f64 = 2000.0;

/// Direct-query failures the boundary layer maps to error responses
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    /// Caller input is missing or unusable
    #[error("Bad input: {0}")]
    BadInput(String),

    /// No model is loaded
    #[error("Model unavailable")]
    ModelUnavailable,
}

/// Candidate with coordinates and classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedCandidate {
    pub kepid: Option<i64>,
    pub kepoi_name: Option<String>,
    #[serde(rename = "X")]
    pub x: Option<f64>,
    #[serde(rename = "Y")]
    pub y: Option<f64>,
    #[serde(rename = "Z")]
    pub z: Option<f64>,
    pub ml_result: PredictionResult,
}

/// Sky position plus its unit-sphere projection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinateRow {
    pub kepoi_name: Option<String>,
    pub ra: f64,
    pub dec: f64,
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
    #[serde(rename = "Z")]
    pub z: f64,
}

pub struct CandidateEnrichmentPipeline {
    cache: Arc<DatasetCache>,
    engine: Arc<InferenceEngine>,
}

impl CandidateEnrichmentPipeline {
    pub fn new(cache: Arc<DatasetCache>, engine: Arc<InferenceEngine>) -> Self {
        Self { cache, engine }
    }

    pub fn cache(&self) -> &DatasetCache {
        &self.cache
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    /// First `limit` cached candidates that carry a sky position
    pub async fn coordinates(&self, limit: usize) -> Vec<CoordinateRow> {
        let snapshot = self.cache.get().await;
        snapshot
            .positioned()
            .filter_map(|(record, coordinate)| {
                // A defined coordinate implies both angles parse
                let ra = record.number("ra")?;
                let dec = record.number("dec")?;
                Some(CoordinateRow {
                    kepoi_name: record.text("kepoi_name"),
                    ra,
                    dec,
                    x: coordinate.x,
                    y: coordinate.y,
                    z: coordinate.z,
                })
            })
            .take(limit)
            .collect()
    }

    /// First `limit` cached candidates, enriched
    pub async fn enrich(&self, limit: usize) -> Vec<EnrichedCandidate> {
        if limit == 0 {
            return Vec::new();
        }
        let snapshot = self.cache.get().await;
        self.enrich_records(snapshot.records().iter().map(|c| &c.record), limit)
    }

    /// Enrich up to `limit` records, preserving order. Every input record
    /// yields exactly one output, whatever its prediction status.
    pub fn enrich_records<'a, I>(&self, records: I, limit: usize) -> Vec<EnrichedCandidate>
    where
        I: IntoIterator<Item = &'a CandidateRecord>,
    {
        let schema = self.engine.required_schema();
        records
            .into_iter()
            .take(limit)
            .map(|record| {
                let coordinate = transform_record(record);
                let (features, warnings) = reconcile_with_warnings(record, schema);
                if !warnings.is_empty() {
                    debug!(
                        kepoi_name = ?record.text("kepoi_name"),
                        coerced = warnings.len(),
                        "Filled missing or malformed features"
                    );
                }
                EnrichedCandidate {
                    kepid: record.integer("kepid"),
                    kepoi_name: record.text("kepoi_name"),
                    x: coordinate.map(|c| c.x),
                    y: coordinate.map(|c| c.y),
                    z: coordinate.map(|c| c.z),
                    ml_result: self.engine.predict(&features),
                }
            })
            .collect()
    }

    /// Classify a single caller-supplied feature map
    pub fn predict_one(&self, raw: &CandidateRecord) -> Result<PredictionResult, QueryError> {
        if raw.is_empty() {
            return Err(QueryError::BadInput("no features supplied".to_string()));
        }
        if !self.engine.is_loaded() {
            return Err(QueryError::ModelUnavailable);
        }

        let (features, warnings) = reconcile_with_warnings(raw, self.engine.required_schema());
        if warnings.len() == features.len() {
            debug!("None of the supplied fields match the model schema; all features imputed");
        }
        Ok(self.engine.predict(&features))
    }

    /// Flat `[x, y, z, ...]` list for point-cloud rendering
    pub async fn star_vertices(&self, limit: usize, scale: f64) -> Vec<f64> {
        let snapshot = self.cache.get().await;
        snapshot
            .positioned()
            .take(limit)
            .map(|(_, coordinate)| coordinate.scaled(scale))
            .filter(|p| {
                [p.x, p.y, p.z]
                    .iter()
                    .all(|v| v.is_finite() && v.abs() < VERTEX_BOUND)
            })
            .flat_map(|p| [p.x, p.y, p.z])
            .collect()
    }
}
