//! Inference engine
//!
//! Wraps the (optional) model artifacts behind a single `predict` contract.
//! The engine is built once at startup and its state never changes:
//!
//! - `Unloaded`: artifact files absent; every prediction is `ModelUnavailable`
//! - `Loaded`: artifacts present and consistent
//! - `Faulted`: artifacts present but unreadable or inconsistent; treated
//!   like `Unloaded` for predictions, reported separately in diagnostics
//!
//! No failure inside preprocessing or classification escapes `predict`; it is
//! turned into an `InferenceError` status instead.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{InferenceFailure, ModelArtifacts, PredictionLabel, PredictionResult};
use crate::features::{FeatureSchema, FeatureVector};

static EMPTY_SCHEMA: FeatureSchema = FeatureSchema::empty();

/// Model availability
#[derive(Debug, Clone)]
pub enum EngineState {
    Unloaded,
    Loaded(Arc<ModelArtifacts>),
    Faulted(String),
}

/// Process-lifetime classifier handle
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    state: EngineState,
}

impl InferenceEngine {
    /// Engine with no model
    pub fn unloaded() -> Self {
        Self {
            state: EngineState::Unloaded,
        }
    }

    pub fn with_artifacts(artifacts: ModelArtifacts) -> Self {
        Self {
            state: EngineState::Loaded(Arc::new(artifacts)),
        }
    }

    /// Load artifacts from `model_dir`, degrading instead of failing
    pub fn load(model_dir: &Path) -> Self {
        let state = match ModelArtifacts::load(model_dir) {
            Ok(artifacts) => {
                info!(
                    model_dir = %model_dir.display(),
                    features = artifacts.schema().len(),
                    probabilities = artifacts.classifier().has_probabilities(),
                    "✓ Model artifacts loaded"
                );
                EngineState::Loaded(Arc::new(artifacts))
            }
            Err(e) if e.is_missing() => {
                warn!("{}; predictions will report model_unavailable", e);
                EngineState::Unloaded
            }
            Err(e) => {
                error!(model_dir = %model_dir.display(), "Model artifacts rejected: {}", e);
                EngineState::Faulted(e.to_string())
            }
        };
        Self { state }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Short state name for diagnostics
    pub fn state_name(&self) -> &'static str {
        match self.state {
            EngineState::Unloaded => "unloaded",
            EngineState::Loaded(_) => "loaded",
            EngineState::Faulted(_) => "faulted",
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, EngineState::Loaded(_))
    }

    /// Schema callers must reconcile against; empty unless loaded
    pub fn required_schema(&self) -> &FeatureSchema {
        match &self.state {
            EngineState::Loaded(artifacts) => artifacts.schema(),
            _ => &EMPTY_SCHEMA,
        }
    }

    pub fn predict(&self, features: &FeatureVector) -> PredictionResult {
        let artifacts = match &self.state {
            EngineState::Loaded(artifacts) => artifacts,
            _ => return PredictionResult::model_unavailable(),
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| run(artifacts, features)));
        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(failure)) => {
                warn!("Inference failed: {}", failure);
                PredictionResult::inference_error(failure.to_string())
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Inference panicked: {}", message);
                PredictionResult::inference_error(InferenceFailure::Panicked(message).to_string())
            }
        }
    }
}

fn run(artifacts: &ModelArtifacts, features: &FeatureVector) -> Result<PredictionResult, InferenceFailure> {
    if features.is_empty() {
        return Err(InferenceFailure::EmptyInput);
    }
    if !features.names().eq(artifacts.schema().names().iter().map(String::as_str)) {
        return Err(InferenceFailure::SchemaMismatch);
    }

    let row = artifacts.preprocessor().transform(&features.to_dense())?;
    let raw = artifacts.classifier().classify(&row)?;

    let confidence = match raw.confidence {
        Some(p) if p.is_finite() => Some(p.clamp(0.0, 1.0)),
        Some(_) => return Err(InferenceFailure::NonFinite("class probability".to_string())),
        None => None,
    };
    Ok(PredictionResult::ok(PredictionLabel::from_raw(raw.class), confidence))
}
