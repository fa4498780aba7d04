//! Feature schema and reconciliation
//!
//! The model was trained on a fixed, ordered list of columns. Whatever an
//! upstream row or a caller supplies is aligned against that list here:
//! exactly one entry per schema name, in schema order, each either a finite
//! number or the missing sentinel. Reconciliation never fails.

use exo_common::{CandidateRecord, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Schema validation errors (raised at artifact load time only)
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("feature schema is empty")]
    Empty,

    #[error("feature schema contains a blank name at position {0}")]
    BlankName(usize),

    #[error("feature schema lists '{0}' more than once")]
    Duplicate(String),
}

/// Ordered list of feature names the model expects
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// Validated schema: non-empty, no blank names, no duplicates
    pub fn new(names: Vec<String>) -> Result<Self, SchemaError> {
        if names.is_empty() {
            return Err(SchemaError::Empty);
        }
        let mut seen = HashSet::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(SchemaError::BlankName(i));
            }
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::Duplicate(name.clone()));
            }
        }
        Ok(Self { names })
    }

    /// Schema with no columns, used when no model is loaded
    pub const fn empty() -> Self {
        Self { names: Vec::new() }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Why a field ended up as the missing sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionReason {
    Absent,
    Null,
    NotNumeric,
    NonFinite,
}

/// Non-fatal, per-field note produced during reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCoercionWarning {
    pub field: String,
    pub reason: CoercionReason,
}

/// Model input aligned to a [`FeatureSchema`]
///
/// `None` marks a missing value; the preprocessor imputes it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(String, Option<f64>)>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<Option<f64>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Values in schema order, NaN for missing
    pub fn to_dense(&self) -> Vec<f64> {
        self.entries
            .iter()
            .map(|(_, v)| v.unwrap_or(f64::NAN))
            .collect()
    }

    pub fn missing_count(&self) -> usize {
        self.entries.iter().filter(|(_, v)| v.is_none()).count()
    }
}

/// Align `record` to `schema`, returning the vector and any coercion notes
pub fn reconcile_with_warnings(
    record: &CandidateRecord,
    schema: &FeatureSchema,
) -> (FeatureVector, Vec<FeatureCoercionWarning>) {
    let mut warnings = Vec::new();
    let entries = schema
        .names()
        .iter()
        .map(|name| {
            let value = match coerce(record.get(name)) {
                Ok(v) => Some(v),
                Err(reason) => {
                    warnings.push(FeatureCoercionWarning {
                        field: name.clone(),
                        reason,
                    });
                    None
                }
            };
            (name.clone(), value)
        })
        .collect();

    (FeatureVector { entries }, warnings)
}

/// Align `record` to `schema`
pub fn reconcile(record: &CandidateRecord, schema: &FeatureSchema) -> FeatureVector {
    reconcile_with_warnings(record, schema).0
}

fn coerce(value: Option<&FieldValue>) -> Result<f64, CoercionReason> {
    match value {
        None => Err(CoercionReason::Absent),
        Some(FieldValue::Null) => Err(CoercionReason::Null),
        // Flag columns (koi_fpflag_*) are 0/1 integers upstream
        Some(FieldValue::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
        Some(FieldValue::Number(n)) if n.is_finite() => Ok(*n),
        Some(FieldValue::Number(_)) => Err(CoercionReason::NonFinite),
        Some(FieldValue::Text(s)) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(n),
            Ok(_) => Err(CoercionReason::NonFinite),
            Err(_) => Err(CoercionReason::NotNumeric),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(names: &[&str]) -> FeatureSchema {
        FeatureSchema::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_schema_validation() {
        assert_eq!(FeatureSchema::new(vec![]), Err(SchemaError::Empty));
        assert_eq!(
            FeatureSchema::new(vec!["a".into(), " ".into()]),
            Err(SchemaError::BlankName(1))
        );
        assert_eq!(
            FeatureSchema::new(vec!["a".into(), "b".into(), "a".into()]),
            Err(SchemaError::Duplicate("a".into()))
        );
        assert_eq!(schema(&["a", "b"]).len(), 2);
    }

    #[test]
    fn test_keys_match_schema_for_any_record() {
        let s = schema(&["koi_period", "koi_prad", "koi_teq"]);
        let records = [
            CandidateRecord::new(),
            CandidateRecord::new()
                .with("unrelated", 1.0)
                .with("kepoi_name", "K00001.01"),
            CandidateRecord::new()
                .with("koi_period", "abc")
                .with("koi_prad", "")
                .with("koi_teq", "1e999"),
            CandidateRecord::new()
                .with("koi_teq", 300.0)
                .with("koi_period", 12.0)
                .with("koi_prad", 1.5),
        ];

        for record in &records {
            let v = reconcile(record, &s);
            let names: Vec<&str> = v.names().collect();
            assert_eq!(names, vec!["koi_period", "koi_prad", "koi_teq"]);
        }
    }

    #[test]
    fn test_preserves_schema_order_not_record_order() {
        let s = schema(&["c", "a", "b"]);
        let record = CandidateRecord::new()
            .with("a", 1.0)
            .with("b", 2.0)
            .with("c", 3.0);
        assert_eq!(reconcile(&record, &s).to_dense(), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_coercion_rules() {
        let s = schema(&["num", "text_num", "flag", "junk", "null", "absent"]);
        let record = CandidateRecord::new()
            .with("num", 4.5)
            .with("text_num", " 7 ")
            .with("flag", true)
            .with("junk", "n/a")
            .with("null", FieldValue::Null);

        let (v, warnings) = reconcile_with_warnings(&record, &s);
        assert_eq!(v.get("num"), Some(Some(4.5)));
        assert_eq!(v.get("text_num"), Some(Some(7.0)));
        assert_eq!(v.get("flag"), Some(Some(1.0)));
        assert_eq!(v.get("junk"), Some(None));
        assert_eq!(v.get("null"), Some(None));
        assert_eq!(v.get("absent"), Some(None));
        assert_eq!(v.missing_count(), 3);

        let reasons: Vec<(&str, CoercionReason)> = warnings
            .iter()
            .map(|w| (w.field.as_str(), w.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("junk", CoercionReason::NotNumeric),
                ("null", CoercionReason::Null),
                ("absent", CoercionReason::Absent),
            ]
        );
    }

    #[test]
    fn test_empty_schema_yields_empty_vector() {
        let record = CandidateRecord::new().with("koi_period", 1.0);
        let v = reconcile(&record, &FeatureSchema::empty());
        assert!(v.is_empty());
    }

    #[test]
    fn test_dense_uses_nan_for_missing() {
        let s = schema(&["a", "b"]);
        let dense = reconcile(&CandidateRecord::new().with("a", 2.0), &s).to_dense();
        assert_eq!(dense[0], 2.0);
        assert!(dense[1].is_nan());
    }
}
