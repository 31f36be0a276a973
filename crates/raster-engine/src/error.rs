//! Error types for the scenario engine.

use projection::ProjectionError;
use thiserror::Error;

/// Errors that can occur while editing or tabulating LULC rasters.
#[derive(Error, Debug)]
pub enum EngineError {
    /// No candidate reference raster could be opened.
    #[error("no reference raster could be opened (tried: {})", candidates.join(", "))]
    ReferenceUnavailable { candidates: Vec<String> },

    /// Geometry could not be reprojected, or CRSs are incompatible.
    #[error("projection error: {0}")]
    Projection(String),

    /// Polygon is unparseable, empty or has no area.
    #[error("empty geometry: {0}")]
    EmptyGeometry(String),

    /// Two rasters that must share a grid do not.
    #[error("grid mismatch: expected {expected}, found {actual}")]
    Alignment { expected: String, actual: String },

    /// The requested window does not overlap the raster at all.
    #[error("requested window {requested} is outside raster bounds {raster}")]
    OutOfBounds { requested: String, raster: String },

    /// Filesystem or TIFF codec failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// The file is a TIFF but not one this engine can use.
    #[error("unsupported raster: {0}")]
    RasterFormat(String),

    /// Raster attribute table missing or malformed.
    #[error("attribute table error: {0}")]
    AttributeTable(String),

    /// The operation was cancelled between blocks.
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Create a Projection error.
    pub fn projection(msg: impl Into<String>) -> Self {
        Self::Projection(msg.into())
    }

    /// Create an EmptyGeometry error.
    pub fn empty_geometry(msg: impl Into<String>) -> Self {
        Self::EmptyGeometry(msg.into())
    }

    /// Create an Io error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Create a RasterFormat error.
    pub fn raster_format(msg: impl Into<String>) -> Self {
        Self::RasterFormat(msg.into())
    }

    /// Create an AttributeTable error.
    pub fn attribute_table(msg: impl Into<String>) -> Self {
        Self::AttributeTable(msg.into())
    }

    /// Create an Alignment error.
    pub fn alignment(expected: impl ToString, actual: impl ToString) -> Self {
        Self::Alignment {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an OutOfBounds error.
    pub fn out_of_bounds(requested: impl ToString, raster: impl ToString) -> Self {
        Self::OutOfBounds {
            requested: requested.to_string(),
            raster: raster.to_string(),
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReferenceUnavailable { .. } => "reference_unavailable",
            Self::Projection(_) => "projection",
            Self::EmptyGeometry(_) => "empty_geometry",
            Self::Alignment { .. } => "alignment",
            Self::OutOfBounds { .. } => "out_of_bounds",
            Self::Io(_) => "io",
            Self::RasterFormat(_) => "raster_format",
            Self::AttributeTable(_) => "attribute_table",
            Self::Cancelled => "cancelled",
            Self::Config(_) => "config",
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<tiff::TiffError> for EngineError {
    fn from(err: tiff::TiffError) -> Self {
        match err {
            tiff::TiffError::IoError(e) => Self::Io(e.to_string()),
            other => Self::RasterFormat(other.to_string()),
        }
    }
}

impl From<quick_xml::Error> for EngineError {
    fn from(err: quick_xml::Error) -> Self {
        Self::AttributeTable(err.to_string())
    }
}

impl From<ProjectionError> for EngineError {
    fn from(err: ProjectionError) -> Self {
        match err {
            ProjectionError::EmptyGeometry(msg) => Self::EmptyGeometry(msg),
            other => Self::Projection(other.to_string()),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
