//! Common error types for the exoplanet candidate service

use thiserror::Error;

/// Common result type for exo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the exo crates
#[derive(Error, Debug)]
pub enum Error {
    /// Config file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
