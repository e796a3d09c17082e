//! Error types for extraction and compositing.

use thiserror::Error;

/// Errors that can occur while planning or compositing a mosaic.
#[derive(Error, Debug)]
pub enum MosaicError {
    /// Output grids must be planar; degree-based pixel sizes break grid alignment.
    #[error("unsupported output CRS {0}: geographic CRSs cannot be used for output grids")]
    UnsupportedOutputCrs(String),

    /// A source could not be opened or read.
    #[error("source unreadable: {url}: {message}")]
    SourceUnreadable { url: String, message: String },

    /// Invalid output profile parameters.
    #[error("invalid output profile: {0}")]
    InvalidProfile(String),

    /// The output raster could not be created or persisted.
    #[error("failed to open output: {0}")]
    OutputOpen(String),

    /// A window read or write fell outside the raster.
    #[error("window {window} is outside raster bounds {width}x{height}")]
    WindowOutOfBounds {
        window: String,
        width: usize,
        height: usize,
    },

    /// Coordinate transformation failed.
    #[error("projection error: {0}")]
    Projection(String),

    /// Raster encoding error.
    #[error("encode error: {0}")]
    Encode(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    Io(String),
}

impl MosaicError {
    /// Create a SourceUnreadable error.
    pub fn source_unreadable(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnreadable {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidProfile error.
    pub fn invalid_profile(msg: impl Into<String>) -> Self {
        Self::InvalidProfile(msg.into())
    }

    /// Create a Projection error.
    pub fn projection(msg: impl Into<String>) -> Self {
        Self::Projection(msg.into())
    }

    /// Whether the error aborts the whole job.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::SourceUnreadable { .. } | Self::Projection(_))
    }
}

impl From<std::io::Error> for MosaicError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<tiff::TiffError> for MosaicError {
    fn from(err: tiff::TiffError) -> Self {
        Self::Encode(err.to_string())
    }
}

impl From<serde_yaml::Error> for MosaicError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, MosaicError>;
