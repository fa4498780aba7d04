//! HTTP API handlers for exo-api
//!
//! Thin axum layer over [`crate::pipeline::CandidateEnrichmentPipeline`].
//! Handlers translate query parameters and bodies, call one pipeline
//! operation, and map [`crate::pipeline::QueryError`] onto status codes.

pub mod cache;
pub mod candidates;
pub mod health;
pub mod predict;

pub use cache::cache_routes;
pub use candidates::candidate_routes;
pub use health::health_routes;
pub use predict::predict_routes;
