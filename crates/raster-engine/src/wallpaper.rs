//! Wallpapering: tile a pattern taken from a source raster across a parcel.
//!
//! The pattern is anchored at the output raster's top-left pixel, so block
//! `(xoff, yoff)` starts reading the pattern at `(xoff mod pw, yoff mod ph)`.
//! Output pixels are therefore the same whatever block size is used.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::fill::{render_parcel, write_options};
use crate::geotiff::{read_raster, write_raster, GeoTiffReader};
use crate::grid::GridReference;
use crate::raster::{BlockWindow, Raster};
use crate::resample::resample_from_reader;
use crate::scratch::scratch_dir;
use crate::window::{polygon_bounds, snap_covering};
use geo::MultiPolygon;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Mask value marking pixels inside the parcel.
pub const PARCEL: u16 = 1;

/// Cooperative cancellation, checked between blocks.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear a previous cancellation before starting a new operation.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Pattern pixels held in memory for the duration of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternTile {
    data: Vec<u16>,
    width: usize,
    height: usize,
}

impl PatternTile {
    pub fn new(data: Vec<u16>, width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(EngineError::empty_geometry(format!(
                "pattern of {width}x{height} px with {} values",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn from_raster(raster: Raster) -> Result<Self> {
        let (width, height) = (raster.width(), raster.height());
        Self::new(raster.into_data(), width, height)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// The pattern tiled over an output block.
    ///
    /// Equivalent to repeating the tile `1 + (phase + size) / tile_size`
    /// times in each direction and cropping from the phase offset.
    pub fn tile_block(&self, block: &BlockWindow) -> Vec<u16> {
        let phase_x = block.xoff % self.width;
        let phase_y = block.yoff % self.height;
        let mut out = Vec::with_capacity(block.width * block.height);
        for row in 0..block.height {
            let src_row = (phase_y + row) % self.height;
            let line = &self.data[src_row * self.width..(src_row + 1) * self.width];
            out.extend((0..block.width).map(|col| line[(phase_x + col) % self.width]));
        }
        out
    }
}

/// Combine `base` and the tiled `pattern` through `mask`, block by block.
///
/// `base` and `mask` must share a grid. Where the mask is set the pattern
/// wins, elsewhere the base value is kept.
pub fn composite(
    mask: &Raster,
    base: &Raster,
    pattern: &PatternTile,
    block_size: usize,
    cancel: &CancelFlag,
) -> Result<Raster> {
    mask.grid().ensure_same_grid(base.grid())?;

    let mut out = Raster::empty(mask.grid().clone(), base.nodata());
    for block in mask.blocks(block_size) {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let mask_values = mask.read_block(&block);
        let base_values = base.read_block(&block);
        let tiled = pattern.tile_block(&block);
        let values: Vec<u16> = mask_values
            .iter()
            .zip(base_values.iter().zip(&tiled))
            .map(|(m, (b, p))| if *m == PARCEL { *p } else { *b })
            .collect();
        out.write_block(&block, &values)?;
    }
    Ok(out)
}

/// Wallpaper `parcel` with the part of `source` under `pattern_area` and
/// write the result to `target`.
///
/// Intermediate files live in a `wallpaper-parcel-*` directory under
/// `working_dir` (or the configured scratch root) that is removed on return.
#[allow(clippy::too_many_arguments)]
pub fn wallpaper_parcel(
    grid: &GridReference,
    parcel: &MultiPolygon<f64>,
    pattern_area: &MultiPolygon<f64>,
    source: &Path,
    target: &Path,
    working_dir: Option<&Path>,
    config: &EngineConfig,
    cancel: &CancelFlag,
) -> Result<Raster> {
    let scratch = scratch_dir(
        "wallpaper-parcel-",
        working_dir.or(config.scratch_dir.as_deref()),
    )?;

    let mut reader = GeoTiffReader::open(source)?;
    let source_crs = reader.info().grid.spatial_ref;
    if !source_crs.is_equivalent(&grid.spatial_reference()) {
        return Err(EngineError::projection(format!(
            "source raster {} is in {}, the reference grid is in {}",
            source.display(),
            source_crs,
            grid.spatial_reference()
        )));
    }

    let mask_path = scratch.path().join("mask.tif");
    let mask = render_parcel(grid, parcel, PARCEL, config)?;
    write_raster(&mask_path, &mask, &write_options(config, false))?;
    let mask = read_raster(&mask_path)?;

    let base = resample_from_reader(&mut reader, mask.grid(), config.nodata)?;

    let pattern_bounds = polygon_bounds(pattern_area)?;
    let source_transform = reader.info().grid.transform;
    let pattern_window = snap_covering(&pattern_bounds, &source_transform)?;
    let pattern_grid = pattern_window.grid(&source_transform, source_crs);
    let pattern =
        PatternTile::from_raster(resample_from_reader(&mut reader, &pattern_grid, config.nodata)?)?;

    debug!(
        mask_width = mask.width(),
        mask_height = mask.height(),
        pattern_width = pattern.width(),
        pattern_height = pattern.height(),
        "wallpapering parcel"
    );

    let out = composite(&mask, &base, &pattern, config.block_size, cancel)?;
    write_raster(target, &out, &write_options(config, true))?;

    info!(target = %target.display(), "wrote wallpapered raster");
    Ok(out)
}
