//! Per-class pixel counts under a parcel.

use crate::error::{EngineError, Result};
use crate::geotiff::GeoTiffReader;
use crate::raster::Raster;
use crate::rasterize::{rasterize, Mask};
use crate::window::{polygon_bounds, snap_covering};
use geo::MultiPolygon;
use scenario_common::ClassHistogram;
use tracing::debug;

/// Count source pixels under `mask`, skipping the source's nodata value.
pub fn histogram_under_mask(raster: &Raster, mask: &Mask) -> ClassHistogram {
    raster
        .data()
        .iter()
        .zip(mask.as_slice())
        .filter(|(value, covered)| **covered && !raster.is_nodata(**value))
        .map(|(value, _)| *value)
        .collect()
}

/// Tabulate the classes of the raster behind `reader` under `parcel`.
///
/// The parcel's bounds are snapped to the raster's own grid and clipped to
/// its extent; every pixel the parcel touches counts in full.
pub fn pixel_counts(reader: &mut GeoTiffReader, parcel: &MultiPolygon<f64>) -> Result<ClassHistogram> {
    let info = reader.info().clone();
    let bounds = polygon_bounds(parcel)?;
    let window = snap_covering(&bounds, &info.grid.transform)?;
    let clipped = window
        .clip_to(&info.grid.transform, info.grid.width, info.grid.height)
        .ok_or_else(|| EngineError::out_of_bounds(window, info.grid.bounds()))?;

    let values = reader.read_window(&clipped)?;
    let mask = rasterize(parcel, values.grid());
    let histogram = histogram_under_mask(&values, &mask);

    debug!(
        window = %clipped,
        masked = mask.count(),
        counted = histogram.total(),
        "tabulated pixels under parcel"
    );
    Ok(histogram)
}
