//! Error types for the shared value types.

use thiserror::Error;

/// Result type alias using ChipError.
pub type ChipResult<T> = Result<T, ChipError>;

/// Errors raised while constructing or parsing shared value types.
#[derive(Debug, Error)]
pub enum ChipError {
    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    #[error("Invalid bounding box: {0}")]
    InvalidBbox(String),

    #[error("Invalid time expression: {0}")]
    InvalidTime(String),

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for ChipError {
    fn from(err: std::io::Error) -> Self {
        ChipError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for ChipError {
    fn from(err: serde_json::Error) -> Self {
        ChipError::InternalError(format!("JSON error: {}", err))
    }
}
