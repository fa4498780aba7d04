//! # Exo Common Library
//!
//! Shared code for the exoplanet candidate service crates:
//! - Bootstrap configuration loading and resolution
//! - Candidate record data model (loosely typed upstream rows)
//! - Sky-position to unit-sphere coordinate transform
//! - Common error type

pub mod config;
pub mod coordinates;
pub mod error;
pub mod record;

pub use coordinates::{transform, CartesianCoordinate};
pub use error::{Error, Result};
pub use record::{CandidateRecord, FieldValue};
