//! Sky position → unit-sphere cartesian coordinates
//!
//! Right ascension and declination (degrees) are projected onto a sphere of
//! fixed radius 1.0. Values outside the usual [0, 360) / [-90, 90] ranges are
//! passed through unchanged; only non-finite input is rejected.

use crate::record::CandidateRecord;
use serde::{Deserialize, Serialize};

/// Projection radius
pub const UNIT_RADIUS: f64 = 1.0;

/// Point on the unit sphere
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartesianCoordinate {
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
    #[serde(rename = "Z")]
    pub z: f64,
}

impl CartesianCoordinate {
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Multiply every component by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            z: self.z * factor,
        }
    }
}

/// Project (ra, dec) in degrees onto the unit sphere.
///
/// Returns `None` when either angle is missing or not finite.
pub fn transform(ra_degrees: Option<f64>, dec_degrees: Option<f64>) -> Option<CartesianCoordinate> {
    let ra = ra_degrees.filter(|v| v.is_finite())?.to_radians();
    let dec = dec_degrees.filter(|v| v.is_finite())?.to_radians();

    let (sin_dec, cos_dec) = dec.sin_cos();
    let (sin_ra, cos_ra) = ra.sin_cos();

    Some(CartesianCoordinate {
        x: UNIT_RADIUS * cos_dec * cos_ra,
        y: UNIT_RADIUS * cos_dec * sin_ra,
        z: UNIT_RADIUS * sin_dec,
    })
}

/// Project the `ra`/`dec` fields of a record
pub fn transform_record(record: &CandidateRecord) -> Option<CartesianCoordinate> {
    transform(record.number("ra"), record.number("dec"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_origin_direction() {
        let c = transform(Some(0.0), Some(0.0)).unwrap();
        assert!((c.x - 1.0).abs() < EPS);
        assert!(c.y.abs() < EPS);
        assert!(c.z.abs() < EPS);
    }

    #[test]
    fn test_quarter_turn_in_ra() {
        let c = transform(Some(90.0), Some(0.0)).unwrap();
        assert!(c.x.abs() < EPS);
        assert!((c.y - 1.0).abs() < EPS);
        assert!(c.z.abs() < EPS);
    }

    #[test]
    fn test_celestial_poles() {
        let north = transform(Some(123.0), Some(90.0)).unwrap();
        assert!((north.z - 1.0).abs() < EPS);
        let south = transform(Some(5.0), Some(-90.0)).unwrap();
        assert!((south.z + 1.0).abs() < EPS);
    }

    #[test]
    fn test_unit_norm_over_grid() {
        // Includes out-of-range angles, which are passed through
        let mut ra = -400.0;
        while ra <= 800.0 {
            let mut dec = -200.0;
            while dec <= 200.0 {
                let c = transform(Some(ra), Some(dec)).unwrap();
                let norm = c.magnitude();
                assert!((norm - 1.0).abs() < EPS, "ra={} dec={} |c|={}", ra, dec, norm);
                dec += 7.3;
            }
            ra += 13.7;
        }
    }

    #[test]
    fn test_missing_or_non_finite_is_undefined() {
        assert!(transform(Some(10.0), None).is_none());
        assert!(transform(None, Some(10.0)).is_none());
        assert!(transform(None, None).is_none());
        assert!(transform(Some(f64::NAN), Some(10.0)).is_none());
        assert!(transform(Some(10.0), Some(f64::NAN)).is_none());
        assert!(transform(Some(f64::INFINITY), Some(10.0)).is_none());
    }

    #[test]
    fn test_transform_record_reads_numeric_text() {
        let record = CandidateRecord::new().with("ra", "90").with("dec", 0.0);
        let c = transform_record(&record).unwrap();
        assert!((c.y - 1.0).abs() < EPS);

        let bad = CandidateRecord::new().with("ra", "n/a").with("dec", 0.0);
        assert!(transform_record(&bad).is_none());
    }

    #[test]
    fn test_serializes_with_upper_case_axes() {
        let c = CartesianCoordinate { x: 1.0, y: 0.0, z: 0.0 };
        let value = serde_json::to_value(c).unwrap();
        assert_eq!(value, serde_json::json!({"X": 1.0, "Y": 0.0, "Z": 0.0}));
    }
}
