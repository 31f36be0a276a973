//! Generators for synthetic parcels and land-cover grids.
//!
//! These create predictable, verifiable inputs so tests can assert exact
//! pixel values after fills, tiling and tabulation.

use crate::fixtures::parcel;

/// WKT polygon approximating a circle, the way a point buffer is drawn.
///
/// Vertices are placed at angles `2πk / segments`, starting due east and
/// running counter-clockwise; the ring is closed.
///
/// # Example
///
/// ```
/// use test_utils::circle_polygon_wkt;
///
/// let wkt = circle_polygon_wkt((0.0, 0.0), 1.0, 4);
/// assert!(wkt.starts_with("POLYGON(("));
/// ```
pub fn circle_polygon_wkt(center: (f64, f64), radius: f64, segments: usize) -> String {
    let segments = segments.max(3);
    let mut coords = Vec::with_capacity(segments + 1);
    for k in 0..segments {
        let angle = 2.0 * std::f64::consts::PI * k as f64 / segments as f64;
        coords.push(format!(
            "{} {}",
            center.0 + radius * angle.cos(),
            center.1 + radius * angle.sin()
        ));
    }
    coords.push(coords[0].clone());
    format!("POLYGON(({}))", coords.join(", "))
}

/// WKT polygon for an axis-aligned rectangle.
pub fn rectangle_wkt(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> String {
    format!(
        "POLYGON(({min_x} {min_y}, {max_x} {min_y}, {max_x} {max_y}, {min_x} {max_y}, {min_x} {min_y}))"
    )
}

/// The San Antonio parcel in EPSG:3857.
pub fn san_antonio_parcel_wkt() -> String {
    circle_polygon_wkt(parcel::CENTER_3857, parcel::RADIUS_3857, parcel::SEGMENTS)
}

/// A square pattern area near the San Antonio parcel in EPSG:3857.
pub fn san_antonio_pattern_wkt() -> String {
    let (cx, cy) = parcel::PATTERN_CENTER_3857;
    let h = parcel::PATTERN_HALF_WIDTH_3857;
    rectangle_wkt(cx - h, cy - h, cx + h, cy + h)
}

/// A grid filled with one class, in row-major order.
pub fn uniform_class_grid(width: usize, height: usize, class: u16) -> Vec<u16> {
    vec![class; width * height]
}

/// Creates a grid whose values encode their own position.
///
/// Each cell value is `base + row * width + col`, so any misplaced pixel is
/// detectable.
///
/// ```
/// use test_utils::indexed_class_grid;
///
/// let grid = indexed_class_grid(3, 2, 100);
/// assert_eq!(grid, vec![100, 101, 102, 103, 104, 105]);
/// ```
pub fn indexed_class_grid(width: usize, height: usize, base: u16) -> Vec<u16> {
    (0..width * height).map(|i| base + i as u16).collect()
}

/// A two-class checkerboard with square cells of `cell` pixels.
pub fn checkerboard_class_grid(
    width: usize,
    height: usize,
    cell: usize,
    classes: (u16, u16),
) -> Vec<u16> {
    let cell = cell.max(1);
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            if (row / cell + col / cell) % 2 == 0 {
                data.push(classes.0);
            } else {
                data.push(classes.1);
            }
        }
    }
    data
}
