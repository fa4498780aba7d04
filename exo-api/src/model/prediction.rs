//! Prediction result types

use serde::{Deserialize, Serialize};

/// Class label produced by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionLabel {
    #[serde(rename = "Candidate")]
    Candidate,
    #[serde(rename = "False Positive")]
    FalsePositive,
    /// Raw class value outside the trained label table
    #[serde(rename = "Unknown")]
    Unknown,
}

impl PredictionLabel {
    /// Label table used at training time: 0 → Candidate, 1 → False Positive
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            0 => PredictionLabel::Candidate,
            1 => PredictionLabel::FalsePositive,
            _ => PredictionLabel::Unknown,
        }
    }
}

/// Outcome class of a single prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Ok,
    ModelUnavailable,
    InferenceError,
}

/// Result of classifying one feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(rename = "prediction")]
    pub label: Option<PredictionLabel>,
    /// Maximum class probability, when the classifier provides one
    #[serde(rename = "probability")]
    pub confidence: Option<f64>,
    pub status: PredictionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionResult {
    pub fn ok(label: PredictionLabel, confidence: Option<f64>) -> Self {
        Self {
            label: Some(label),
            confidence,
            status: PredictionStatus::Ok,
            error: None,
        }
    }

    pub fn model_unavailable() -> Self {
        Self {
            label: None,
            confidence: None,
            status: PredictionStatus::ModelUnavailable,
            error: None,
        }
    }

    pub fn inference_error(message: impl Into<String>) -> Self {
        Self {
            label: None,
            confidence: None,
            status: PredictionStatus::InferenceError,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == PredictionStatus::Ok
    }
}
