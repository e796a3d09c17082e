//! Error types for catalog access.

use thiserror::Error;

/// Errors raised while querying a catalog or parsing query filters.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A resolution or datetime filter string could not be parsed.
    ///
    /// Resolvers recover from this by ignoring the filter.
    #[error("invalid {kind} filter '{filter}': {message}")]
    InvalidFilterSyntax {
        kind: &'static str,
        filter: String,
        message: String,
    },

    /// The request could not be sent or the response body not received.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A response body was not valid catalog JSON.
    #[error("decode error: {0}")]
    Decode(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CatalogError {
    /// Create an InvalidFilterSyntax error.
    pub fn invalid_filter(
        kind: &'static str,
        filter: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidFilterSyntax {
            kind,
            filter: filter.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
