//! Parcel fill: burn a single class into a new raster around a parcel.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::geotiff::{write_raster, WriteOptions};
use crate::grid::GridReference;
use crate::raster::Raster;
use crate::rasterize::{burn, rasterize};
use geo::MultiPolygon;
use std::path::Path;
use tracing::debug;

/// Allocate a raster around `parcel` and burn `class_value` into every pixel
/// the parcel touches. Everything else is nodata.
pub fn render_parcel(
    grid: &GridReference,
    parcel: &MultiPolygon<f64>,
    class_value: u16,
    config: &EngineConfig,
) -> Result<Raster> {
    let (window, mut raster) = grid.allocate(parcel, config.buffer_policy, config.nodata)?;
    let mask = rasterize(parcel, raster.grid());
    burn(&mut raster, &mask, class_value);

    debug!(
        window = %window,
        class_value,
        burned = mask.count(),
        "rendered parcel"
    );
    Ok(raster)
}

/// Render `parcel` filled with `class_value` and write it to `target`.
pub fn fill_parcel(
    grid: &GridReference,
    parcel: &MultiPolygon<f64>,
    class_value: u16,
    target: &Path,
    config: &EngineConfig,
) -> Result<Raster> {
    let raster = render_parcel(grid, parcel, class_value, config)?;
    write_raster(target, &raster, &write_options(config, false))?;
    Ok(raster)
}

pub(crate) fn write_options(config: &EngineConfig, overviews: bool) -> WriteOptions {
    WriteOptions {
        bigtiff: config.bigtiff,
        block_size: config.block_size,
        overview_min_dimension: overviews.then_some(config.overview_min_dimension),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BufferPolicy;
    use crate::geotiff::RasterInfo;
    use crate::raster::{GeoTransform, RasterGrid};
    use geo::polygon;
    use scenario_common::CrsCode;

    fn unit_reference() -> GridReference {
        let grid = RasterGrid::new(
            GeoTransform::new(0.0, 1.0, 100.0, -1.0),
            100,
            100,
            CrsCode::Epsg5070.into(),
        );
        GridReference::from_info(
            "reference.tif",
            RasterInfo {
                grid,
                nodata: Some(0),
                bits_per_sample: 8,
            },
        )
    }

    #[test]
    fn test_render_without_buffer() {
        let config = EngineConfig {
            buffer_policy: BufferPolicy::None,
            ..Default::default()
        };
        let parcel = MultiPolygon(vec![
            polygon![(x: 10.5, y: 10.5), (x: 12.5, y: 10.5), (x: 12.5, y: 12.5), (x: 10.5, y: 12.5)],
        ]);
        let raster = render_parcel(&unit_reference(), &parcel, 15, &config).unwrap();
        assert_eq!((raster.width(), raster.height()), (3, 3));
        assert_eq!(raster.count_value(15), 9);
        assert_eq!(raster.sum_valid(), 135);
    }

    #[test]
    fn test_buffer_adds_nodata_context() {
        let config = EngineConfig::default();
        let parcel = MultiPolygon(vec![
            polygon![(x: 10.5, y: 10.5), (x: 12.5, y: 10.5), (x: 12.5, y: 12.5), (x: 10.5, y: 12.5)],
        ]);
        let raster = render_parcel(&unit_reference(), &parcel, 15, &config).unwrap();
        // bounds grow by 2 on every side: 8.5..14.5 snaps to 8..15
        assert_eq!((raster.width(), raster.height()), (7, 7));
        assert_eq!(raster.count_value(15), 9);
        assert_eq!(raster.count_value(config.nodata), 49 - 9);
        assert_eq!(raster.sum_valid(), 135);
    }
}
