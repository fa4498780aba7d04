//! Column preprocessing: median imputation followed by standard scaling

use serde::{Deserialize, Serialize};

use super::InferenceFailure;

/// Fitted per-column transform, stored as `preprocessor.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    /// Fill value for missing entries (training medians)
    pub impute: Vec<f64>,
    /// Column means subtracted after imputation
    pub mean: Vec<f64>,
    /// Column scales divided out after centering; 0 is treated as 1
    pub scale: Vec<f64>,
}

impl Preprocessor {
    /// Number of input columns, if all three arrays agree
    pub fn width(&self) -> Option<usize> {
        let n = self.impute.len();
        (self.mean.len() == n && self.scale.len() == n).then_some(n)
    }

    /// Non-finite fitted parameters make every output meaningless
    pub fn first_non_finite(&self) -> Option<(&'static str, usize)> {
        [("impute", &self.impute), ("mean", &self.mean), ("scale", &self.scale)]
            .into_iter()
            .find_map(|(name, values)| {
                values
                    .iter()
                    .position(|v| !v.is_finite())
                    .map(|i| (name, i))
            })
    }

    /// Impute NaN entries, then center and scale each column
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, InferenceFailure> {
        if row.len() != self.impute.len() {
            return Err(InferenceFailure::DimensionMismatch {
                expected: self.impute.len(),
                actual: row.len(),
            });
        }

        row.iter()
            .enumerate()
            .map(|(i, &value)| {
                let filled = if value.is_nan() { self.impute[i] } else { value };
                let scale = if self.scale[i] == 0.0 { 1.0 } else { self.scale[i] };
                let out = (filled - self.mean[i]) / scale;
                if out.is_finite() {
                    Ok(out)
                } else {
                    Err(InferenceFailure::NonFinite(format!("preprocessed column {}", i)))
                }
            })
            .collect()
    }
}
