//! Pixel-aligned windows and raster allocation.
//!
//! Window edges are computed as integer pixel indices from the grid origin,
//! so every bound is an exact multiple of the pixel size away from the
//! origin and the column/row counts need no rounding.

use crate::config::BufferPolicy;
use crate::error::{EngineError, Result};
use crate::raster::{GeoTransform, Raster, RasterGrid};
use geo::{BoundingRect, MultiPolygon};
use scenario_common::{BoundingBox, SpatialReference};
use tracing::debug;

/// A grid-aligned rectangle of whole pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterWindow {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub n_columns: usize,
    pub n_rows: usize,
    /// Column of the window's left edge, counted from the grid origin.
    pub col_offset: i64,
    /// Row of the window's top edge, counted from the grid origin.
    pub row_offset: i64,
}

impl RasterWindow {
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// Grid for a raster covering exactly this window.
    pub fn grid(&self, transform: &GeoTransform, spatial_ref: SpatialReference) -> RasterGrid {
        RasterGrid::new(
            transform.offset(self.col_offset, self.row_offset),
            self.n_columns,
            self.n_rows,
            spatial_ref,
        )
    }

    /// Restrict the window to `[0, width) × [0, height)` pixel indices of
    /// its grid. Returns `None` when nothing remains.
    pub fn clip_to(&self, transform: &GeoTransform, width: usize, height: usize) -> Option<RasterWindow> {
        let col_start = self.col_offset.max(0);
        let row_start = self.row_offset.max(0);
        let col_end = (self.col_offset + self.n_columns as i64).min(width as i64);
        let row_end = (self.row_offset + self.n_rows as i64).min(height as i64);
        if col_start >= col_end || row_start >= row_end {
            return None;
        }
        Some(window_from_indices(transform, col_start, row_start, col_end, row_end))
    }
}

impl std::fmt::Display for RasterWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}x{} px at col {}, row {})",
            self.bounds(),
            self.n_columns,
            self.n_rows,
            self.col_offset,
            self.row_offset
        )
    }
}

/// Snap `bounds` outward onto the pixel lattice of `transform`.
///
/// Minimum edges move to the lattice line at or below them, maximum edges
/// to the next lattice line strictly above them, so every point of `bounds`
/// falls inside the window.
pub fn snap_to_grid(bounds: &BoundingBox, transform: &GeoTransform) -> Result<RasterWindow> {
    if bounds.is_degenerate() {
        return Err(EngineError::empty_geometry(format!(
            "cannot snap degenerate bounds {}",
            bounds
        )));
    }
    let (px, py) = transform.pixel_size();
    if !(px > 0.0 && py > 0.0) {
        return Err(EngineError::raster_format("grid has a zero pixel size"));
    }

    let x_index = |v: f64| ((v - transform.origin_x) / px).floor() as i64;
    let y_index = |v: f64| ((v - transform.origin_y) / py).floor() as i64;

    let ix_min = x_index(bounds.min_x);
    let ix_max = x_index(bounds.max_x) + 1;
    let iy_min = y_index(bounds.min_y);
    let iy_max = y_index(bounds.max_y) + 1;

    let window = if transform.pixel_height < 0.0 {
        // Rows grow southward: the top edge is the largest y index.
        window_from_indices(transform, ix_min, -iy_max, ix_max, -iy_min)
    } else {
        window_from_indices(transform, ix_min, iy_min, ix_max, iy_max)
    };
    Ok(window)
}

/// Snap bounds inward-tolerant for reads: floor the minimum edges and ceil
/// the maximum ones, so bounds already on the lattice are kept as they are.
pub fn snap_covering(bounds: &BoundingBox, transform: &GeoTransform) -> Result<RasterWindow> {
    if bounds.is_degenerate() {
        return Err(EngineError::empty_geometry(format!(
            "cannot snap degenerate bounds {}",
            bounds
        )));
    }
    let (c0, r0) = transform.world_to_pixel(bounds.min_x, bounds.max_y);
    let (c1, r1) = transform.world_to_pixel(bounds.max_x, bounds.min_y);
    let col_start = c0.min(c1).floor() as i64;
    let col_end = c0.max(c1).ceil() as i64;
    let row_start = r0.min(r1).floor() as i64;
    let row_end = r0.max(r1).ceil() as i64;
    Ok(window_from_indices(
        transform,
        col_start,
        row_start,
        col_end.max(col_start + 1),
        row_end.max(row_start + 1),
    ))
}

fn window_from_indices(
    transform: &GeoTransform,
    col_start: i64,
    row_start: i64,
    col_end: i64,
    row_end: i64,
) -> RasterWindow {
    let (x0, y0) = transform.pixel_to_world(col_start as f64, row_start as f64);
    let (x1, y1) = transform.pixel_to_world(col_end as f64, row_end as f64);
    RasterWindow {
        min_x: x0.min(x1),
        min_y: y0.min(y1),
        max_x: x0.max(x1),
        max_y: y0.max(y1),
        n_columns: (col_end - col_start) as usize,
        n_rows: (row_end - row_start) as usize,
        col_offset: col_start,
        row_offset: row_start,
    }
}

/// Bounds of a polygon, rejecting empty or zero-area extents.
pub fn polygon_bounds(polygon: &MultiPolygon<f64>) -> Result<BoundingBox> {
    let rect = polygon
        .bounding_rect()
        .ok_or_else(|| EngineError::empty_geometry("polygon has no coordinates"))?;
    let bounds = BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y);
    if bounds.is_degenerate() {
        return Err(EngineError::empty_geometry(format!(
            "polygon bounds {} have no area",
            bounds
        )));
    }
    Ok(bounds)
}

/// Compute the pixel-aligned window around `polygon` and a new raster
/// covering it, filled with `nodata`.
pub fn allocate(
    transform: &GeoTransform,
    spatial_ref: SpatialReference,
    polygon: &MultiPolygon<f64>,
    policy: BufferPolicy,
    nodata: u16,
) -> Result<(RasterWindow, Raster)> {
    let bounds = polygon_bounds(polygon)?;
    let buffered = bounds.expand(policy.distance(bounds.width(), bounds.height()));
    let window = snap_to_grid(&buffered, transform)?;

    debug!(
        parcel_bounds = %bounds,
        window = %window,
        "allocated parcel window"
    );

    let raster = Raster::empty(window.grid(transform, spatial_ref), Some(nodata));
    Ok((window, raster))
}
