//! All-touched polygon rasterization.
//!
//! A pixel is burned when the polygon touches it at all: its center lies
//! inside the polygon (even-odd over every ring, so holes are respected),
//! or any ring edge passes through it. Interior pixels come from a scanline
//! pass at pixel centers; boundary pixels from a grid traversal of each
//! edge.

use crate::raster::{Raster, RasterGrid};
use geo::{CoordsIter, LineString, MultiPolygon};

/// Per-pixel membership of a polygon on a grid, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl Mask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, col: usize, row: usize) -> bool {
        col < self.width && row < self.height && self.cells[row * self.width + col]
    }

    /// Number of burned pixels.
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.cells
    }

    fn mark(&mut self, col: i64, row: i64) {
        if col >= 0 && row >= 0 && (col as usize) < self.width && (row as usize) < self.height {
            self.cells[row as usize * self.width + col as usize] = true;
        }
    }
}

/// Rasterize `polygon` onto `grid` with all-touched semantics.
pub fn rasterize(polygon: &MultiPolygon<f64>, grid: &RasterGrid) -> Mask {
    let mut mask = Mask::new(grid.width, grid.height);
    if grid.is_empty() {
        return mask;
    }

    let rings: Vec<Vec<(f64, f64)>> = polygon
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
        .map(|ring| to_pixel_space(ring, grid))
        .filter(|ring| ring.len() >= 2)
        .collect();

    fill_interior(&mut mask, &rings);
    for ring in &rings {
        for edge in ring.windows(2) {
            trace_edge(&mut mask, edge[0], edge[1]);
        }
    }
    mask
}

/// Write `value` into every pixel of `raster` covered by `mask`.
pub fn burn(raster: &mut Raster, mask: &Mask, value: u16) {
    for (pixel, covered) in raster.data_mut().iter_mut().zip(mask.as_slice()) {
        if *covered {
            *pixel = value;
        }
    }
}

fn to_pixel_space(ring: &LineString<f64>, grid: &RasterGrid) -> Vec<(f64, f64)> {
    let mut points: Vec<(f64, f64)> = ring
        .coords_iter()
        .map(|c| grid.transform.world_to_pixel(c.x, c.y))
        .collect();
    if let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) {
        if first != last {
            points.push(first);
        }
    }
    points
}

/// Scanline at pixel centers; crossings are paired even-odd.
fn fill_interior(mask: &mut Mask, rings: &[Vec<(f64, f64)>]) {
    let mut crossings: Vec<f64> = Vec::new();
    for row in 0..mask.height {
        let yc = row as f64 + 0.5;
        crossings.clear();
        for ring in rings {
            for edge in ring.windows(2) {
                let ((x0, y0), (x1, y1)) = (edge[0], edge[1]);
                if (y0 <= yc) != (y1 <= yc) {
                    crossings.push(x0 + (yc - y0) / (y1 - y0) * (x1 - x0));
                }
            }
        }
        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            // pixels whose center x falls in [span[0], span[1])
            let start = (span[0] - 0.5).ceil().max(0.0) as i64;
            let end = ((span[1] - 0.5).ceil() as i64).min(mask.width as i64);
            for col in start..end {
                mask.mark(col, row as i64);
            }
        }
    }
}

/// Mark every pixel the segment passes through (Amanatides-Woo traversal).
fn trace_edge(mask: &mut Mask, from: (f64, f64), to: (f64, f64)) {
    let (x0, y0) = from;
    let (x1, y1) = to;
    if !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
        return;
    }

    let mut col = x0.floor() as i64;
    let mut row = y0.floor() as i64;
    let end_col = x1.floor() as i64;
    let end_row = y1.floor() as i64;

    let dx = x1 - x0;
    let dy = y1 - y0;
    let step_col = if dx > 0.0 { 1 } else { -1 };
    let step_row = if dy > 0.0 { 1 } else { -1 };

    let t_delta_x = if dx != 0.0 { 1.0 / dx.abs() } else { f64::INFINITY };
    let t_delta_y = if dy != 0.0 { 1.0 / dy.abs() } else { f64::INFINITY };
    let mut t_max_x = if dx > 0.0 {
        (col as f64 + 1.0 - x0) / dx
    } else if dx < 0.0 {
        (col as f64 - x0) / dx
    } else {
        f64::INFINITY
    };
    let mut t_max_y = if dy > 0.0 {
        (row as f64 + 1.0 - y0) / dy
    } else if dy < 0.0 {
        (row as f64 - y0) / dy
    } else {
        f64::INFINITY
    };

    mask.mark(col, row);
    let steps = (end_col - col).abs() + (end_row - row).abs();
    for _ in 0..steps {
        if t_max_x < t_max_y {
            col += step_col;
            t_max_x += t_delta_x;
        } else {
            row += step_row;
            t_max_y += t_delta_y;
        }
        mask.mark(col, row);
    }
}
