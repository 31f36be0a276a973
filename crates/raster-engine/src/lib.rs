//! Parcel-relative editing of land-use/land-cover rasters.
//!
//! Every raster this crate produces is aligned to a fixed reference grid
//! (NLCD in production). A user-drawn parcel arrives as WKT in the client
//! CRS, is reprojected onto the grid and rasterized with all-touched
//! semantics, then either filled with one class, wallpapered with a pattern
//! cut from a source raster, or used as a mask to tabulate the classes
//! beneath it.
//!
//! # Architecture
//!
//! ```text
//! parcel WKT (EPSG:3857)
//!      │
//!      ▼
//! Reprojector::reproject ──► MultiPolygon in grid CRS
//!      │
//!      ├─► GridReference::allocate ──► snapped RasterWindow + nodata Raster
//!      │         │
//!      │         └─► rasterize (all touched) ──► burn class ──► GeoTIFF
//!      │
//!      ├─► wallpaper: mask + source-under-parcel + PatternTile
//!      │         │
//!      │         └─► composite per block ──► GeoTIFF + overviews
//!      │
//!      └─► zonal: snap to source grid ──► read window ──► mask ──► ClassHistogram
//! ```
//!
//! # Example
//!
//! ```ignore
//! use raster_engine::{EngineConfig, ScenarioEngine};
//!
//! let engine = ScenarioEngine::new(EngineConfig::from_env())?;
//! engine.fill_parcel(&parcel_wkt, 15, Path::new("scenario.tif"))?;
//! let counts = engine.pixel_counts_under_parcel(&parcel_wkt, Path::new("scenario.tif"))?;
//! println!("{:?}", counts.fractions());
//! ```

pub mod classnames;
pub mod config;
pub mod engine;
pub mod error;
pub mod fill;
pub mod geokeys;
pub mod geotiff;
pub mod grid;
pub mod overview;
pub mod raster;
pub mod rasterize;
pub mod resample;
pub mod scratch;
pub mod wallpaper;
pub mod window;
pub mod zonal;

// Re-export commonly used types at crate root
pub use config::{BufferPolicy, EngineConfig};
pub use engine::ScenarioEngine;
pub use error::{EngineError, Result};
pub use geotiff::{read_raster, write_raster, GeoTiffReader, RasterInfo, WriteOptions};
pub use grid::GridReference;
pub use raster::{BlockWindow, GeoTransform, Raster, RasterGrid};
pub use rasterize::{rasterize, Mask};
pub use wallpaper::{CancelFlag, PatternTile};
pub use window::RasterWindow;
