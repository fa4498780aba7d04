//! Linear classifiers evaluated on preprocessed rows
//!
//! Two artifact kinds are understood:
//! - `logistic`: binary (one coefficient row, sigmoid) or multinomial
//!   (one row per class, softmax); exposes class probabilities
//! - `linear`: binary decision function only; no probabilities

use serde::{Deserialize, Serialize};

use super::InferenceFailure;

/// Fitted classifier, stored as `classifier.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    Logistic {
        classes: Vec<i64>,
        coefficients: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
    },
    Linear {
        classes: Vec<i64>,
        coefficients: Vec<f64>,
        intercept: f64,
    },
}

/// Raw class value plus optional max-class probability
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPrediction {
    pub class: i64,
    pub confidence: Option<f64>,
}

impl Classifier {
    /// Expected input width, or a description of the inconsistency
    pub fn input_width(&self) -> Result<usize, String> {
        match self {
            Classifier::Logistic {
                classes,
                coefficients,
                intercepts,
            } => {
                if classes.len() < 2 {
                    return Err(format!("logistic model needs at least 2 classes, has {}", classes.len()));
                }
                if coefficients.len() != intercepts.len() {
                    return Err(format!(
                        "{} coefficient rows but {} intercepts",
                        coefficients.len(),
                        intercepts.len()
                    ));
                }
                let binary = classes.len() == 2 && coefficients.len() == 1;
                if !binary && coefficients.len() != classes.len() {
                    return Err(format!(
                        "{} coefficient rows for {} classes",
                        coefficients.len(),
                        classes.len()
                    ));
                }
                let width = coefficients[0].len();
                if coefficients.iter().any(|row| row.len() != width) {
                    return Err("coefficient rows differ in length".to_string());
                }
                Ok(width)
            }
            Classifier::Linear { classes, coefficients, .. } => {
                if classes.len() != 2 {
                    return Err(format!("linear model needs exactly 2 classes, has {}", classes.len()));
                }
                Ok(coefficients.len())
            }
        }
    }

    /// Whether [`Classifier::classify`] reports a confidence
    pub fn has_probabilities(&self) -> bool {
        matches!(self, Classifier::Logistic { .. })
    }

    pub fn classify(&self, row: &[f64]) -> Result<RawPrediction, InferenceFailure> {
        match self {
            Classifier::Logistic {
                classes,
                coefficients,
                intercepts,
            } => {
                if coefficients.len() == 1 {
                    let z = decision(&coefficients[0], intercepts[0], row)?;
                    let p1 = sigmoid(z);
                    let (class, confidence) = if z > 0.0 {
                        (classes[1], p1)
                    } else {
                        (classes[0], 1.0 - p1)
                    };
                    return Ok(RawPrediction {
                        class,
                        confidence: Some(confidence),
                    });
                }

                let scores = coefficients
                    .iter()
                    .zip(intercepts)
                    .map(|(w, &b)| decision(w, b, row))
                    .collect::<Result<Vec<_>, _>>()?;
                let probs = softmax(&scores);
                let (best, p) = probs
                    .iter()
                    .copied()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });
                Ok(RawPrediction {
                    class: classes[best],
                    confidence: Some(p),
                })
            }
            Classifier::Linear {
                classes,
                coefficients,
                intercept,
            } => {
                let d = decision(coefficients, *intercept, row)?;
                Ok(RawPrediction {
                    class: if d > 0.0 { classes[1] } else { classes[0] },
                    confidence: None,
                })
            }
        }
    }
}

fn decision(weights: &[f64], bias: f64, row: &[f64]) -> Result<f64, InferenceFailure> {
    if weights.len() != row.len() {
        return Err(InferenceFailure::DimensionMismatch {
            expected: weights.len(),
            actual: row.len(),
        });
    }
    let z = weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + bias;
    if z.is_finite() {
        Ok(z)
    } else {
        Err(InferenceFailure::NonFinite("decision function".to_string()))
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_logistic() -> Classifier {
        Classifier::Logistic {
            classes: vec![0, 1],
            coefficients: vec![vec![2.0, -1.0]],
            intercepts: vec![0.0],
        }
    }

    #[test]
    fn test_binary_logistic_probabilities() {
        let clf = binary_logistic();
        assert_eq!(clf.input_width(), Ok(2));

        let pos = clf.classify(&[1.0, 0.0]).unwrap();
        assert_eq!(pos.class, 1);
        assert!((pos.confidence.unwrap() - sigmoid(2.0)).abs() < 1e-12);

        let neg = clf.classify(&[0.0, 3.0]).unwrap();
        assert_eq!(neg.class, 0);
        assert!((neg.confidence.unwrap() - (1.0 - sigmoid(-3.0))).abs() < 1e-12);
        assert!(neg.confidence.unwrap() >= 0.5);
    }

    #[test]
    fn test_multinomial_picks_highest_probability() {
        let clf = Classifier::Logistic {
            classes: vec![0, 1, 7],
            coefficients: vec![vec![1.0], vec![0.0], vec![-1.0]],
            intercepts: vec![0.0, 0.0, 0.0],
        };
        let out = clf.classify(&[-4.0]).unwrap();
        assert_eq!(out.class, 7);
        let p = out.confidence.unwrap();
        assert!(p > 0.9 && p <= 1.0);
    }

    #[test]
    fn test_linear_has_no_confidence() {
        let clf = Classifier::Linear {
            classes: vec![0, 1],
            coefficients: vec![1.0],
            intercept: -0.5,
        };
        assert!(!clf.has_probabilities());
        assert_eq!(
            clf.classify(&[1.0]).unwrap(),
            RawPrediction { class: 1, confidence: None }
        );
        assert_eq!(clf.classify(&[0.0]).unwrap().class, 0);
    }

    #[test]
    fn test_inconsistent_shapes_are_reported() {
        let bad_rows = Classifier::Logistic {
            classes: vec![0, 1, 2],
            coefficients: vec![vec![1.0], vec![1.0]],
            intercepts: vec![0.0, 0.0],
        };
        assert!(bad_rows.input_width().is_err());

        let ragged = Classifier::Logistic {
            classes: vec![0, 1],
            coefficients: vec![vec![1.0], vec![1.0, 2.0]],
            intercepts: vec![0.0, 0.0],
        };
        assert!(ragged.input_width().is_err());

        let one_class = Classifier::Linear {
            classes: vec![0],
            coefficients: vec![1.0],
            intercept: 0.0,
        };
        assert!(one_class.input_width().is_err());
    }

    #[test]
    fn test_wrong_row_width_is_an_error() {
        let err = binary_logistic().classify(&[1.0]).unwrap_err();
        assert_eq!(
            err,
            InferenceFailure::DimensionMismatch { expected: 2, actual: 1 }
        );
    }

    #[test]
    fn test_decodes_tagged_json() {
        let clf: Classifier = serde_json::from_str(
            r#"{"kind": "linear", "classes": [0, 1], "coefficients": [0.5, 0.5], "intercept": 0.1}"#,
        )
        .unwrap();
        assert_eq!(clf.input_width(), Ok(2));
    }
}
