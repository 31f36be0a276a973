//! The scenario engine: one reference grid and reprojector shared by every
//! operation of a worker.

use crate::classnames::read_classnames;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::fill;
use crate::geotiff::GeoTiffReader;
use crate::grid::GridReference;
use crate::raster::Raster;
use crate::wallpaper::{self, CancelFlag};
use crate::zonal;
use projection::Reprojector;
use scenario_common::{ClassEntry, ClassHistogram, SpatialReference};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, instrument};

/// Owns the reference grid and the client-to-grid reprojection.
#[derive(Debug)]
pub struct ScenarioEngine {
    config: EngineConfig,
    grid: GridReference,
    reprojector: Reprojector,
    cancel: CancelFlag,
}

impl ScenarioEngine {
    /// Validate `config` and load the first readable reference raster.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate().map_err(EngineError::Config)?;
        let grid = GridReference::load(&config.reference_candidates)?;
        Self::with_grid(config, grid)
    }

    /// Build an engine around an already loaded grid.
    pub fn with_grid(config: EngineConfig, grid: GridReference) -> Result<Self> {
        let reprojector = Reprojector::new(
            SpatialReference::from(config.client_crs),
            grid.spatial_reference(),
        )?;
        info!(
            reference = %grid.path().display(),
            client_crs = %config.client_crs,
            grid_crs = %grid.spatial_reference(),
            "scenario engine ready"
        );
        Ok(Self {
            config,
            grid,
            reprojector,
            cancel: CancelFlag::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn grid(&self) -> &GridReference {
        &self.grid
    }

    /// Handle for cancelling the running operation from another thread.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Fill the parcel with `class_value` and write the raster to `target`.
    #[instrument(skip(self, parcel_wkt), fields(target = %target.display()))]
    pub fn fill_parcel(&self, parcel_wkt: &str, class_value: u16, target: &Path) -> Result<Raster> {
        let parcel = self.reprojector.reproject(parcel_wkt)?;
        fill::fill_parcel(&self.grid, &parcel, class_value, target, &self.config)
    }

    /// Wallpaper the parcel with the pattern under `pattern_wkt` taken from
    /// `source` and write the raster to `target`.
    #[instrument(
        skip(self, parcel_wkt, pattern_wkt),
        fields(source = %source.display(), target = %target.display())
    )]
    pub fn wallpaper_parcel(
        &self,
        parcel_wkt: &str,
        pattern_wkt: &str,
        source: &Path,
        target: &Path,
        working_dir: Option<&Path>,
    ) -> Result<Raster> {
        self.cancel.reset();
        let parcel = self.reprojector.reproject(parcel_wkt)?;
        let pattern = self.reprojector.reproject(pattern_wkt)?;
        wallpaper::wallpaper_parcel(
            &self.grid,
            &parcel,
            &pattern,
            source,
            target,
            working_dir,
            &self.config,
            &self.cancel,
        )
    }

    /// Per-class pixel counts of `source` under the parcel.
    #[instrument(skip(self, parcel_wkt), fields(source = %source.display()))]
    pub fn pixel_counts_under_parcel(&self, parcel_wkt: &str, source: &Path) -> Result<ClassHistogram> {
        let parcel = self.reprojector.reproject(parcel_wkt)?;
        let mut reader = GeoTiffReader::open(source)?;
        if !reader.info().grid.spatial_ref.is_equivalent(self.reprojector.target()) {
            return Err(EngineError::projection(format!(
                "{} is in {}, parcels are reprojected to {}",
                source.display(),
                reader.info().grid.spatial_ref,
                self.reprojector.target()
            )));
        }
        zonal::pixel_counts(&mut reader, &parcel)
    }

    /// Class names and colours of `raster`, or of the reference raster.
    #[instrument(skip(self))]
    pub fn classnames(&self, raster: Option<&Path>) -> Result<BTreeMap<u16, ClassEntry>> {
        let path = raster.unwrap_or(self.grid.path());
        let color_map = GeoTiffReader::open(path)?.color_map()?;
        read_classnames(path, &self.config.classname_column, color_map.as_deref())
    }
}
