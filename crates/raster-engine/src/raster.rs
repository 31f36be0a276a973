//! In-memory single-band LULC rasters and their grid geometry.

use crate::error::{EngineError, Result};
use scenario_common::{BoundingBox, SpatialReference};

/// Tolerance for comparing grid coordinates, in CRS units.
const GRID_TOLERANCE: f64 = 1e-6;

/// North-up affine georeferencing: `x = origin_x + col * pixel_width`,
/// `y = origin_y + row * pixel_height`. `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub origin_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, pixel_width: f64, origin_y: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            origin_y,
            pixel_height,
        }
    }

    /// Absolute pixel size as (x, y).
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.pixel_width.abs(), self.pixel_height.abs())
    }

    /// World coordinate of a pixel corner (fractional indices allowed).
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y + row * self.pixel_height,
        )
    }

    /// Fractional pixel indices of a world coordinate.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Transform of the sub-grid whose top-left pixel is `(col, row)`.
    pub fn offset(&self, col: i64, row: i64) -> GeoTransform {
        let (x, y) = self.pixel_to_world(col as f64, row as f64);
        GeoTransform::new(x, self.pixel_width, y, self.pixel_height)
    }

    fn approx_eq(&self, other: &GeoTransform) -> bool {
        (self.origin_x - other.origin_x).abs() < GRID_TOLERANCE
            && (self.origin_y - other.origin_y).abs() < GRID_TOLERANCE
            && (self.pixel_width - other.pixel_width).abs() < GRID_TOLERANCE
            && (self.pixel_height - other.pixel_height).abs() < GRID_TOLERANCE
    }
}

/// Size, georeferencing and CRS of a raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
    pub spatial_ref: SpatialReference,
}

impl RasterGrid {
    pub fn new(
        transform: GeoTransform,
        width: usize,
        height: usize,
        spatial_ref: SpatialReference,
    ) -> Self {
        Self {
            transform,
            width,
            height,
            spatial_ref,
        }
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extent of the raster in CRS units.
    pub fn bounds(&self) -> BoundingBox {
        let (x0, y0) = self.transform.pixel_to_world(0.0, 0.0);
        let (x1, y1) = self
            .transform
            .pixel_to_world(self.width as f64, self.height as f64);
        BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// World coordinate of a pixel's center.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform
            .pixel_to_world(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Fail with an alignment error unless both grids have the same size,
    /// pixel size, bounding box and CRS.
    pub fn ensure_same_grid(&self, other: &RasterGrid) -> Result<()> {
        let same = self.width == other.width
            && self.height == other.height
            && self.transform.approx_eq(&other.transform)
            && self.spatial_ref.is_equivalent(&other.spatial_ref);
        if same {
            Ok(())
        } else {
            Err(EngineError::alignment(self.describe(), other.describe()))
        }
    }

    fn describe(&self) -> String {
        let (px, py) = self.transform.pixel_size();
        format!(
            "{}x{} px of {}x{} at {} in {}",
            self.width,
            self.height,
            px,
            py,
            self.bounds(),
            self.spatial_ref
        )
    }
}

/// A block of pixels within a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockWindow {
    pub xoff: usize,
    pub yoff: usize,
    pub width: usize,
    pub height: usize,
}

/// Iterator over row-major blocks covering a raster.
#[derive(Debug, Clone)]
pub struct BlockIter {
    width: usize,
    height: usize,
    block_size: usize,
    xoff: usize,
    yoff: usize,
}

impl BlockIter {
    pub fn new(width: usize, height: usize, block_size: usize) -> Self {
        Self {
            width,
            height,
            block_size: block_size.max(1),
            xoff: 0,
            yoff: 0,
        }
    }
}

impl Iterator for BlockIter {
    type Item = BlockWindow;

    fn next(&mut self) -> Option<BlockWindow> {
        if self.width == 0 || self.yoff >= self.height {
            return None;
        }

        let block = BlockWindow {
            xoff: self.xoff,
            yoff: self.yoff,
            width: self.block_size.min(self.width - self.xoff),
            height: self.block_size.min(self.height - self.yoff),
        };

        self.xoff += self.block_size;
        if self.xoff >= self.width {
            self.xoff = 0;
            self.yoff += self.block_size;
        }

        Some(block)
    }
}

/// A single-band `u16` land-cover raster held in memory, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    grid: RasterGrid,
    data: Vec<u16>,
    nodata: Option<u16>,
}

impl Raster {
    /// A raster with every pixel set to `value`.
    pub fn filled(grid: RasterGrid, value: u16, nodata: Option<u16>) -> Self {
        let data = vec![value; grid.len()];
        Self { grid, data, nodata }
    }

    /// A raster with every pixel set to nodata (or 0 without a sentinel).
    pub fn empty(grid: RasterGrid, nodata: Option<u16>) -> Self {
        Self::filled(grid, nodata.unwrap_or(0), nodata)
    }

    /// Wrap existing pixel data, checking its length against the grid.
    pub fn from_data(grid: RasterGrid, data: Vec<u16>, nodata: Option<u16>) -> Result<Self> {
        if data.len() != grid.len() {
            return Err(EngineError::raster_format(format!(
                "expected {} pixels for a {}x{} raster, got {}",
                grid.len(),
                grid.width,
                grid.height,
                data.len()
            )));
        }
        Ok(Self { grid, data, nodata })
    }

    pub fn grid(&self) -> &RasterGrid {
        &self.grid
    }

    pub fn width(&self) -> usize {
        self.grid.width
    }

    pub fn height(&self) -> usize {
        self.grid.height
    }

    pub fn nodata(&self) -> Option<u16> {
        self.nodata
    }

    pub fn data(&self) -> &[u16] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u16] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u16> {
        self.data
    }

    pub fn get(&self, col: usize, row: usize) -> Option<u16> {
        if col < self.width() && row < self.height() {
            Some(self.data[row * self.width() + col])
        } else {
            None
        }
    }

    /// True when `value` is this raster's nodata sentinel.
    pub fn is_nodata(&self, value: u16) -> bool {
        self.nodata == Some(value)
    }

    /// Copy out a block of pixels, row-major.
    pub fn read_block(&self, block: &BlockWindow) -> Vec<u16> {
        let mut out = Vec::with_capacity(block.width * block.height);
        for row in block.yoff..block.yoff + block.height {
            let start = row * self.width() + block.xoff;
            out.extend_from_slice(&self.data[start..start + block.width]);
        }
        out
    }

    /// Overwrite a block of pixels from row-major `values`.
    pub fn write_block(&mut self, block: &BlockWindow, values: &[u16]) -> Result<()> {
        if values.len() != block.width * block.height
            || block.xoff + block.width > self.width()
            || block.yoff + block.height > self.height()
        {
            return Err(EngineError::raster_format(format!(
                "block {:?} does not fit a {}x{} raster",
                block,
                self.width(),
                self.height()
            )));
        }
        let width = self.width();
        for (i, row) in (block.yoff..block.yoff + block.height).enumerate() {
            let start = row * width + block.xoff;
            self.data[start..start + block.width]
                .copy_from_slice(&values[i * block.width..(i + 1) * block.width]);
        }
        Ok(())
    }

    /// Blocks of `block_size` pixels covering the raster.
    pub fn blocks(&self, block_size: usize) -> BlockIter {
        BlockIter::new(self.width(), self.height(), block_size)
    }

    /// Iterator over pixel values that are not nodata.
    pub fn valid_values(&self) -> impl Iterator<Item = u16> + '_ {
        let nodata = self.nodata;
        self.data
            .iter()
            .copied()
            .filter(move |v| Some(*v) != nodata)
    }

    /// Sum of all valid pixel values.
    pub fn sum_valid(&self) -> u64 {
        self.valid_values().map(u64::from).sum()
    }

    /// Number of pixels equal to `value`.
    pub fn count_value(&self, value: u16) -> usize {
        self.data.iter().filter(|v| **v == value).count()
    }
}
