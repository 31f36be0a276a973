//! Error types for geometry reprojection.

use thiserror::Error;

/// Errors raised while parsing or reprojecting geometries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    /// A CRS definition could not be turned into a projection.
    #[error("unknown CRS {crs}: {reason}")]
    UnknownCrs { crs: String, reason: String },

    /// A coordinate could not be transformed.
    #[error("failed to transform ({x}, {y}): {reason}")]
    TransformFailed { x: f64, y: f64, reason: String },

    /// The transform produced output identical to its input.
    #[error("transform from {source_crs} to {target_crs} left the geometry unchanged")]
    NoOpTransform {
        source_crs: String,
        target_crs: String,
    },

    /// The WKT text was empty, unparseable or not polygonal.
    #[error("empty or invalid geometry: {0}")]
    EmptyGeometry(String),
}

impl ProjectionError {
    pub fn empty_geometry(msg: impl Into<String>) -> Self {
        Self::EmptyGeometry(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
