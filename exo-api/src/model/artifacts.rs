//! Model artifact loading
//!
//! Three independently stored files make up a model:
//! - `feature_schema.json`: ordered list of input column names
//! - `preprocessor.json`: imputation + scaling parameters
//! - `classifier.json`: fitted classifier
//!
//! They are read once at startup and cross-checked so that all three agree
//! on the input width. Absence of any file is reported separately from every
//! other failure, because a missing model is an expected deployment state.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::{Classifier, Preprocessor};
use crate::features::{FeatureSchema, SchemaError};

pub const SCHEMA_FILE: &str = "feature_schema.json";
pub const PREPROCESSOR_FILE: &str = "preprocessor.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";

/// Artifact load errors
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// One or more artifact files do not exist
    #[error("model artifacts missing: {}", display_paths(.0))]
    Missing(Vec<PathBuf>),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid feature schema: {0}")]
    Schema(#[from] SchemaError),

    /// Files parse but disagree with each other
    #[error("inconsistent model artifacts: {0}")]
    Inconsistent(String),
}

impl ArtifactError {
    pub fn is_missing(&self) -> bool {
        matches!(self, ArtifactError::Missing(_))
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Immutable preprocessing + classifier bundle
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    schema: FeatureSchema,
    preprocessor: Preprocessor,
    classifier: Classifier,
}

impl ModelArtifacts {
    /// Assemble and cross-validate an artifact bundle
    pub fn new(
        schema: FeatureSchema,
        preprocessor: Preprocessor,
        classifier: Classifier,
    ) -> Result<Self, ArtifactError> {
        if schema.is_empty() {
            return Err(SchemaError::Empty.into());
        }
        let width = schema.len();

        match preprocessor.width() {
            Some(w) if w == width => {}
            Some(w) => {
                return Err(ArtifactError::Inconsistent(format!(
                    "preprocessor expects {} columns, schema lists {}",
                    w, width
                )))
            }
            None => {
                return Err(ArtifactError::Inconsistent(
                    "preprocessor impute/mean/scale lengths differ".to_string(),
                ))
            }
        }
        if let Some((field, index)) = preprocessor.first_non_finite() {
            return Err(ArtifactError::Inconsistent(format!(
                "preprocessor {}[{}] is not finite",
                field, index
            )));
        }

        let classifier_width = classifier.input_width().map_err(ArtifactError::Inconsistent)?;
        if classifier_width != width {
            return Err(ArtifactError::Inconsistent(format!(
                "classifier expects {} columns, schema lists {}",
                classifier_width, width
            )));
        }

        Ok(Self {
            schema,
            preprocessor,
            classifier,
        })
    }

    /// Load all three artifacts from `dir`
    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        let schema_path = dir.join(SCHEMA_FILE);
        let preprocessor_path = dir.join(PREPROCESSOR_FILE);
        let classifier_path = dir.join(CLASSIFIER_FILE);

        // A stat failure other than not-found (permissions, a file where the
        // directory should be) is an I/O fault, not an absent model
        let mut missing = Vec::new();
        for path in [&schema_path, &preprocessor_path, &classifier_path] {
            let exists = path.try_exists().map_err(|source| ArtifactError::Io {
                path: path.clone(),
                source,
            })?;
            if !exists {
                missing.push(path.clone());
            }
        }
        if !missing.is_empty() {
            return Err(ArtifactError::Missing(missing));
        }

        let names: Vec<String> = read_json(&schema_path)?;
        let schema = FeatureSchema::new(names)?;
        let preprocessor: Preprocessor = read_json(&preprocessor_path)?;
        let classifier: Classifier = read_json(&classifier_path)?;
        debug!(
            dir = %dir.display(),
            columns = schema.len(),
            "Model artifact files parsed"
        );

        Self::new(schema, preprocessor, classifier)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let content = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
