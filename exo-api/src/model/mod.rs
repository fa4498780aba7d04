//! Candidate classification model
//!
//! Artifacts are loaded once at startup (see [`artifacts`]) and wrapped by the
//! [`InferenceEngine`], which degrades to `ModelUnavailable` when they are
//! absent or rejected.

pub mod artifacts;
pub mod classifier;
pub mod engine;
pub mod prediction;
pub mod preprocessor;

pub use artifacts::{ArtifactError, ModelArtifacts};
pub use classifier::{Classifier, RawPrediction};
pub use engine::{EngineState, InferenceEngine};
pub use prediction::{PredictionLabel, PredictionResult, PredictionStatus};
pub use preprocessor::Preprocessor;

use thiserror::Error;

/// Failure while evaluating a loaded model
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InferenceFailure {
    #[error("feature vector is empty")]
    EmptyInput,

    #[error("feature vector does not follow the model schema")]
    SchemaMismatch,

    #[error("expected {expected} columns, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("non-finite value in {0}")]
    NonFinite(String),

    #[error("model evaluation panicked: {0}")]
    Panicked(String),
}
