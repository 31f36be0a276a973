//! Configuration for the scenario engine.

use crate::wallpaper::PARCEL;
use scenario_common::CrsCode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Reference rasters tried after any configured paths.
pub const DEFAULT_REFERENCE_CANDIDATES: [&str; 2] =
    ["/opt/appdata/NLCD_2016.tif", "appdata/NLCD_2016.tif"];

/// Configuration for the scenario engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Reference rasters, tried in order; the first readable one wins.
    pub reference_candidates: Vec<PathBuf>,

    /// CRS of the WKT geometries sent by the client.
    pub client_crs: CrsCode,

    /// Nodata sentinel for new LULC rasters.
    pub nodata: u16,

    /// Block edge in pixels for strip layout and wallpaper iteration.
    pub block_size: usize,

    /// Stop adding overview levels once the smaller side drops below this.
    pub overview_min_dimension: usize,

    /// Write BigTIFF containers.
    pub bigtiff: bool,

    /// Expand parcel windows by the parcel's smaller dimension.
    pub buffer_policy: BufferPolicy,

    /// Parent directory for scratch directories (system temp if unset).
    pub scratch_dir: Option<PathBuf>,

    /// Attribute-table column holding class names.
    pub classname_column: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reference_candidates: DEFAULT_REFERENCE_CANDIDATES
                .iter()
                .map(PathBuf::from)
                .collect(),
            client_crs: CrsCode::Epsg3857,
            nodata: u16::MAX,
            block_size: 256,
            overview_min_dimension: 256,
            bigtiff: true,
            buffer_policy: BufferPolicy::MinDimension,
            scratch_dir: None,
            classname_column: "NLCD Land Cover Class".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("REFERENCE_RASTER") {
            config.prepend_reference_candidates(&val);
        }

        if let Ok(val) = std::env::var("CLIENT_CRS") {
            if let Ok(code) = CrsCode::from_code_string(&val) {
                config.client_crs = code;
            }
        }

        if let Ok(val) = std::env::var("LULC_NODATA") {
            if let Ok(nodata) = val.parse() {
                config.nodata = nodata;
            }
        }

        if let Ok(val) = std::env::var("RASTER_BLOCK_SIZE") {
            if let Ok(size) = val.parse() {
                config.block_size = size;
            }
        }

        if let Ok(val) = std::env::var("OVERVIEW_MIN_DIMENSION") {
            if let Ok(size) = val.parse() {
                config.overview_min_dimension = size;
            }
        }

        if let Ok(val) = std::env::var("BIGTIFF") {
            config.bigtiff = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("FILL_CONTEXT_BUFFER") {
            config.buffer_policy = if parse_flag(&val) {
                BufferPolicy::MinDimension
            } else {
                BufferPolicy::None
            };
        }

        if let Ok(val) = std::env::var("SCRATCH_DIR") {
            if !val.is_empty() {
                config.scratch_dir = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("CLASSNAME_COLUMN") {
            if !val.is_empty() {
                config.classname_column = val;
            }
        }

        config
    }

    /// Put comma-separated paths ahead of the existing candidates.
    pub fn prepend_reference_candidates(&mut self, paths: &str) {
        let mut candidates: Vec<PathBuf> = paths
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect();
        for existing in self.reference_candidates.drain(..) {
            if !candidates.contains(&existing) {
                candidates.push(existing);
            }
        }
        self.reference_candidates = candidates;
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.reference_candidates.is_empty() {
            return Err("at least one reference raster candidate is required".to_string());
        }

        if self.block_size == 0 || self.block_size % 16 != 0 {
            return Err("block_size must be a positive multiple of 16".to_string());
        }

        if self.nodata == PARCEL {
            return Err(format!(
                "nodata must differ from the parcel mask value {PARCEL}"
            ));
        }

        if self.overview_min_dimension == 0 {
            return Err("overview_min_dimension must be > 0".to_string());
        }

        if self.classname_column.trim().is_empty() {
            return Err("classname_column must not be empty".to_string());
        }

        Ok(())
    }
}

fn parse_flag(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// How far a parcel's raster window extends beyond the parcel itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BufferPolicy {
    /// The window hugs the parcel's bounds.
    None,
    /// Expand the bounds by `min(width, height)` on every side, giving the
    /// edited parcel surrounding context.
    #[default]
    MinDimension,
}

impl BufferPolicy {
    /// Distance to grow bounds of the given size by.
    pub fn distance(&self, width: f64, height: f64) -> f64 {
        match self {
            BufferPolicy::None => 0.0,
            BufferPolicy::MinDimension => width.min(height).abs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.nodata, u16::MAX);
        assert_eq!(config.block_size, 256);
        assert_eq!(config.buffer_policy, BufferPolicy::MinDimension);
    }

    #[test]
    fn test_invalid_block_size() {
        let config = EngineConfig {
            block_size: 100,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nodata_must_differ_from_mask_value() {
        let config = EngineConfig {
            nodata: 1,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("parcel mask value"), "{err}");

        let config = EngineConfig {
            nodata: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_prepend_candidates() {
        let mut config = EngineConfig::default();
        config.prepend_reference_candidates("/data/a.tif, /opt/appdata/NLCD_2016.tif");
        assert_eq!(config.reference_candidates[0], PathBuf::from("/data/a.tif"));
        assert_eq!(
            config.reference_candidates[1],
            PathBuf::from("/opt/appdata/NLCD_2016.tif")
        );
        assert_eq!(config.reference_candidates.len(), 3);
    }

    #[test]
    fn test_buffer_distance() {
        assert_eq!(BufferPolicy::None.distance(10.0, 4.0), 0.0);
        assert_eq!(BufferPolicy::MinDimension.distance(10.0, 4.0), 4.0);
    }
}
