//! Nearest-neighbour resampling onto a target grid.
//!
//! Pixel (0, 0) has its upper-left corner at the grid origin and its center
//! at (0.5, 0.5); a target pixel takes the source pixel containing its
//! center. Both grids must share a CRS.

use crate::error::{EngineError, Result};
use crate::geotiff::GeoTiffReader;
use crate::raster::{Raster, RasterGrid};
use crate::window::snap_covering;

/// Sample `source` at pixel coordinates `(x, y)`; `None` outside the raster.
pub fn sample(source: &Raster, x: f64, y: f64) -> Option<u16> {
    if !(x.is_finite() && y.is_finite()) {
        return None;
    }
    let col = x.floor();
    let row = y.floor();
    if col < 0.0 || row < 0.0 {
        return None;
    }
    source.get(col as usize, row as usize)
}

/// Resample an in-memory raster onto `target`. Target pixels whose center
/// falls outside `source` become `nodata`.
pub fn warp_nearest(source: &Raster, target: &RasterGrid, nodata: u16) -> Result<Raster> {
    ensure_same_crs(source.grid(), target)?;

    let src = &source.grid().transform;
    let mut out = Raster::filled(target.clone(), nodata, Some(nodata));
    let width = target.width;
    for (i, pixel) in out.data_mut().iter_mut().enumerate() {
        let (x, y) = target.pixel_center(i % width, i / width);
        let (col, row) = src.world_to_pixel(x, y);
        if let Some(value) = sample(source, col, row) {
            *pixel = match source.nodata() {
                Some(src_nodata) if value == src_nodata => nodata,
                _ => value,
            };
        }
    }
    Ok(out)
}

/// Resample a GeoTIFF onto `target`, decoding only the chunks that cover it.
///
/// The output's nodata is the source's sentinel when it has one, otherwise
/// `fallback_nodata`.
pub fn resample_from_reader(
    reader: &mut GeoTiffReader,
    target: &RasterGrid,
    fallback_nodata: u16,
) -> Result<Raster> {
    let info = reader.info().clone();
    ensure_same_crs(&info.grid, target)?;
    let nodata = info.nodata.unwrap_or(fallback_nodata);

    let covering = snap_covering(&target.bounds(), &info.grid.transform)?;
    let Some(window) = covering.clip_to(&info.grid.transform, info.grid.width, info.grid.height)
    else {
        return Ok(Raster::filled(target.clone(), nodata, Some(nodata)));
    };

    let source = reader.read_window(&window)?;
    warp_nearest(&source, target, nodata)
}

fn ensure_same_crs(source: &RasterGrid, target: &RasterGrid) -> Result<()> {
    if source.spatial_ref.is_equivalent(&target.spatial_ref) {
        Ok(())
    } else {
        Err(EngineError::projection(format!(
            "source raster is in {}, expected {}",
            source.spatial_ref, target.spatial_ref
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geotiff::{write_raster, WriteOptions};
    use crate::raster::GeoTransform;
    use scenario_common::CrsCode;
    use test_utils::temp_test_dir_with_prefix;

    fn source() -> Raster {
        // 4x4 at 30 m, values 0..16
        let grid = RasterGrid::new(
            GeoTransform::new(0.0, 30.0, 120.0, -30.0),
            4,
            4,
            CrsCode::Epsg5070.into(),
        );
        Raster::from_data(grid, (0..16).collect(), Some(99)).unwrap()
    }

    fn grid(origin_x: f64, origin_y: f64, size: f64, w: usize, h: usize) -> RasterGrid {
        RasterGrid::new(
            GeoTransform::new(origin_x, size, origin_y, -size),
            w,
            h,
            CrsCode::Epsg5070.into(),
        )
    }

    #[test]
    fn test_sample_center_and_bounds() {
        let src = source();
        assert_eq!(sample(&src, 0.5, 0.5), Some(0));
        assert_eq!(sample(&src, 1.5, 0.5), Some(1));
        assert_eq!(sample(&src, 0.5, 1.5), Some(4));
        assert_eq!(sample(&src, -0.1, 0.5), None);
        assert_eq!(sample(&src, 4.0, 0.5), None);
        assert_eq!(sample(&src, f64::NAN, 0.5), None);
    }

    #[test]
    fn test_identity_grid_copies_values() {
        let src = source();
        let out = warp_nearest(&src, src.grid(), 99).unwrap();
        assert_eq!(out.data(), src.data());
    }

    #[test]
    fn test_offset_grid_pads_with_nodata() {
        let src = source();
        // shifted one pixel left and up
        let target = grid(-30.0, 150.0, 30.0, 3, 3);
        let out = warp_nearest(&src, &target, 99).unwrap();
        assert_eq!(out.data(), &[99, 99, 99, 99, 0, 1, 99, 4, 5]);
        assert_eq!(out.nodata(), Some(99));
    }

    #[test]
    fn test_finer_target_repeats_pixels() {
        let src = source();
        let target = grid(0.0, 120.0, 15.0, 4, 2);
        let out = warp_nearest(&src, &target, 99).unwrap();
        assert_eq!(out.data(), &[0, 0, 1, 1, 0, 0, 1, 1]);
    }

    #[test]
    fn test_crs_mismatch_is_projection_error() {
        let src = source();
        let target = RasterGrid::new(src.grid().transform, 4, 4, CrsCode::Epsg3857.into());
        let err = warp_nearest(&src, &target, 99).unwrap_err();
        assert!(matches!(err, EngineError::Projection(_)));
    }

    #[test]
    fn test_reader_resample_matches_in_memory() {
        let dir = temp_test_dir_with_prefix("resample_");
        let path = dir.path().join("source.tif");
        let src = source();
        write_raster(&path, &src, &WriteOptions::default()).unwrap();

        let target = grid(30.0, 90.0, 30.0, 5, 3);
        let mut reader = GeoTiffReader::open(&path).unwrap();
        let from_file = resample_from_reader(&mut reader, &target, 0).unwrap();
        let in_memory = warp_nearest(&src, &target, 99).unwrap();
        assert_eq!(from_file, in_memory);
    }

    #[test]
    fn test_reader_resample_outside_extent() {
        let dir = temp_test_dir_with_prefix("resample_");
        let path = dir.path().join("source.tif");
        write_raster(&path, &source(), &WriteOptions::default()).unwrap();

        let target = grid(10_000.0, 10_000.0, 30.0, 2, 2);
        let mut reader = GeoTiffReader::open(&path).unwrap();
        let out = resample_from_reader(&mut reader, &target, 0).unwrap();
        assert!(out.data().iter().all(|v| *v == 99));
    }
}
