//! Error types for the experiment driver

use poolnet::error::ConfigError;
use thiserror::Error;

/// Result type alias for lab operations
pub type Result<T> = std::result::Result<T, LabError>;

#[derive(Error, Debug)]
pub enum LabError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dataset error on line {line}: {reason}")]
    Dataset { line: usize, reason: String },

    #[error("Usage: {0}")]
    Usage(String),
}
