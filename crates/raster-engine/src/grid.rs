//! The fixed reference grid every edited raster is aligned to.

use crate::config::BufferPolicy;
use crate::error::{EngineError, Result};
use crate::geotiff::{read_info_from_path, RasterInfo};
use crate::raster::{GeoTransform, Raster};
use crate::window::{allocate, snap_to_grid, RasterWindow};
use geo::MultiPolygon;
use scenario_common::{BoundingBox, SpatialReference};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Georeferencing of the reference LULC raster.
///
/// Loaded once from the first readable candidate and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct GridReference {
    path: PathBuf,
    transform: GeoTransform,
    spatial_ref: SpatialReference,
    info: RasterInfo,
}

impl GridReference {
    /// Read the header of the first candidate that opens.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        for candidate in candidates {
            let path = candidate.as_ref();
            match read_info_from_path(path) {
                Ok(info) => {
                    info!(
                        path = %path.display(),
                        crs = %info.grid.spatial_ref,
                        origin_x = info.grid.transform.origin_x,
                        origin_y = info.grid.transform.origin_y,
                        "using reference raster"
                    );
                    return Ok(Self::from_info(path, info));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not open reference raster");
                }
            }
        }

        Err(EngineError::ReferenceUnavailable {
            candidates: candidates
                .iter()
                .map(|c| c.as_ref().display().to_string())
                .collect(),
        })
    }

    /// Build a reference from an already-read header.
    pub fn from_info(path: impl Into<PathBuf>, info: RasterInfo) -> Self {
        Self {
            path: path.into(),
            transform: info.grid.transform,
            spatial_ref: info.grid.spatial_ref,
            info,
        }
    }

    /// Path of the reference raster.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &RasterInfo {
        &self.info
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Top-left corner of the reference raster.
    pub fn origin(&self) -> (f64, f64) {
        (self.transform.origin_x, self.transform.origin_y)
    }

    /// Signed pixel size; the y component is negative for north-up rasters.
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.transform.pixel_width, self.transform.pixel_height)
    }

    pub fn spatial_reference(&self) -> SpatialReference {
        self.spatial_ref
    }

    /// Snap bounds outward onto the reference lattice.
    pub fn snap(&self, bounds: &BoundingBox) -> Result<RasterWindow> {
        snap_to_grid(bounds, &self.transform)
    }

    /// Allocate a nodata-filled raster around `polygon` on the reference lattice.
    pub fn allocate(
        &self,
        polygon: &MultiPolygon<f64>,
        policy: BufferPolicy,
        nodata: u16,
    ) -> Result<(RasterWindow, Raster)> {
        allocate(&self.transform, self.spatial_ref, polygon, policy, nodata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geotiff::{write_raster, WriteOptions};
    use crate::raster::RasterGrid;
    use scenario_common::CrsCode;
    use test_utils::temp_test_dir_with_prefix;

    fn write_reference(dir: &Path) -> PathBuf {
        let path = dir.join("reference.tif");
        let grid = RasterGrid::new(
            GeoTransform::new(-2_493_045.0, 30.0, 3_310_005.0, -30.0),
            8,
            8,
            CrsCode::Epsg5070.into(),
        );
        write_raster(&path, &Raster::filled(grid, 11, Some(0)), &WriteOptions::default()).unwrap();
        path
    }

    #[test]
    fn test_first_readable_candidate_wins() {
        let dir = temp_test_dir_with_prefix("grid_");
        let good = write_reference(dir.path());
        let missing = dir.path().join("missing.tif");

        let grid = GridReference::load(&[missing, good.clone()]).unwrap();
        assert_eq!(grid.path(), good.as_path());
        assert_eq!(grid.origin(), (-2_493_045.0, 3_310_005.0));
        assert_eq!(grid.pixel_size(), (30.0, -30.0));
        assert_eq!(grid.spatial_reference(), SpatialReference::Epsg(CrsCode::Epsg5070));
    }

    #[test]
    fn test_no_candidates_readable() {
        let err = GridReference::load(&["/nonexistent/a.tif", "/nonexistent/b.tif"]).unwrap_err();
        match err {
            EngineError::ReferenceUnavailable { candidates } => {
                assert_eq!(candidates, vec!["/nonexistent/a.tif", "/nonexistent/b.tif"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_snap_is_lattice_aligned() {
        let dir = temp_test_dir_with_prefix("grid_");
        let grid = GridReference::load(&[write_reference(dir.path())]).unwrap();
        let window = grid
            .snap(&BoundingBox::new(-242_963.6, 708_582.9, -242_789.3, 708_756.3))
            .unwrap();
        for edge in [window.min_x, window.max_x] {
            let k = (edge - -2_493_045.0) / 30.0;
            assert!((k - k.round()).abs() < 1e-9);
        }
        for edge in [window.min_y, window.max_y] {
            let k = (edge - 3_310_005.0) / 30.0;
            assert!((k - k.round()).abs() < 1e-9);
        }
        assert!(window.min_x <= -242_963.6 && window.max_x > -242_789.3);
    }
}
