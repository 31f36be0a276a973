//! Coordinate reference system transformations for parcel geometries.
//!
//! Wraps `proj4rs` so callers work in native CRS units (degrees for
//! geographic systems, meters for projected ones) and applies the
//! transformation to whole `geo` geometries parsed from WKT.

pub mod error;
pub mod reproject;
pub mod transform;

pub use error::{ProjectionError, Result};
pub use reproject::{parse_polygonal, to_wkt, Reprojector};
pub use transform::CrsTransform;
