//! Coordinate Reference System types and utilities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known CRS codes the scenario engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lat/lon in degrees)
    Epsg4326,
    /// NAD83 Geographic
    Epsg4269,
    /// Web Mercator (meters), the map client's CRS
    Epsg3857,
    /// CONUS Albers Equal Area (NAD83), the NLCD grid
    Epsg5070,
}

impl CrsCode {
    /// Parse a CRS identifier such as "EPSG:3857" (case-insensitive).
    pub fn from_code_string(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();

        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" => Ok(CrsCode::Epsg4326),
            "EPSG:4269" => Ok(CrsCode::Epsg4269),
            "EPSG:3857" | "EPSG:900913" => Ok(CrsCode::Epsg3857),
            "EPSG:5070" => Ok(CrsCode::Epsg5070),
            _ => Err(CrsParseError::UnsupportedCrs(s.to_string())),
        }
    }

    /// Look up a code from its numeric EPSG identifier.
    pub fn from_epsg(code: u16) -> Option<Self> {
        match code {
            4326 => Some(CrsCode::Epsg4326),
            4269 => Some(CrsCode::Epsg4269),
            3857 => Some(CrsCode::Epsg3857),
            5070 => Some(CrsCode::Epsg5070),
            _ => None,
        }
    }

    /// Numeric EPSG identifier.
    pub fn epsg(&self) -> u16 {
        match self {
            CrsCode::Epsg4326 => 4326,
            CrsCode::Epsg4269 => 4269,
            CrsCode::Epsg3857 => 3857,
            CrsCode::Epsg5070 => 5070,
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326 | CrsCode::Epsg4269)
    }

    /// PROJ definition string for this CRS.
    pub fn proj_definition(&self) -> String {
        match self {
            CrsCode::Epsg4326 => "+proj=longlat +datum=WGS84 +no_defs".to_string(),
            CrsCode::Epsg4269 => {
                "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs".to_string()
            }
            CrsCode::Epsg3857 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 \
                 +x_0=0 +y_0=0 +k=1 +units=m +no_defs"
                .to_string(),
            CrsCode::Epsg5070 => AlbersEqualArea::conus().proj_definition(),
        }
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Geodetic datum of a user-defined projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datum {
    Wgs84,
    Nad83,
}

impl Datum {
    fn proj_params(&self) -> &'static str {
        match self {
            Datum::Wgs84 => "+datum=WGS84",
            Datum::Nad83 => "+ellps=GRS80 +towgs84=0,0,0,0,0,0,0",
        }
    }
}

/// Albers Equal Area parameters, in degrees and meters.
///
/// NLCD rasters carry this as a user-defined projection in their geokeys
/// rather than as an EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlbersEqualArea {
    pub standard_parallel_1: f64,
    pub standard_parallel_2: f64,
    pub latitude_of_origin: f64,
    pub central_meridian: f64,
    pub false_easting: f64,
    pub false_northing: f64,
    pub datum: Datum,
}

impl AlbersEqualArea {
    /// The CONUS parameters used by EPSG:5070.
    pub fn conus() -> Self {
        Self {
            standard_parallel_1: 29.5,
            standard_parallel_2: 45.5,
            latitude_of_origin: 23.0,
            central_meridian: -96.0,
            false_easting: 0.0,
            false_northing: 0.0,
            datum: Datum::Nad83,
        }
    }

    pub fn proj_definition(&self) -> String {
        format!(
            "+proj=aea +lat_0={} +lon_0={} +lat_1={} +lat_2={} +x_0={} +y_0={} {} +units=m +no_defs",
            self.latitude_of_origin,
            self.central_meridian,
            self.standard_parallel_1,
            self.standard_parallel_2,
            self.false_easting,
            self.false_northing,
            self.datum.proj_params(),
        )
    }
}

/// Spatial reference of a raster or geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SpatialReference {
    /// A CRS identified by its EPSG code.
    Epsg(CrsCode),
    /// A user-defined Albers Equal Area projection.
    Albers(AlbersEqualArea),
}

impl SpatialReference {
    /// Collapse definitions that have a well-known code onto that code.
    pub fn normalized(&self) -> SpatialReference {
        match self {
            SpatialReference::Albers(aea) if *aea == AlbersEqualArea::conus() => {
                SpatialReference::Epsg(CrsCode::Epsg5070)
            }
            other => *other,
        }
    }

    /// True when both references describe the same CRS.
    pub fn is_equivalent(&self, other: &SpatialReference) -> bool {
        self.normalized() == other.normalized()
    }

    pub fn is_geographic(&self) -> bool {
        match self {
            SpatialReference::Epsg(code) => code.is_geographic(),
            SpatialReference::Albers(_) => false,
        }
    }

    /// EPSG code, if the reference has one.
    pub fn epsg(&self) -> Option<CrsCode> {
        match self.normalized() {
            SpatialReference::Epsg(code) => Some(code),
            SpatialReference::Albers(_) => None,
        }
    }

    /// PROJ definition string.
    pub fn proj_definition(&self) -> String {
        match self {
            SpatialReference::Epsg(code) => code.proj_definition(),
            SpatialReference::Albers(aea) => aea.proj_definition(),
        }
    }
}

impl From<CrsCode> for SpatialReference {
    fn from(code: CrsCode) -> Self {
        SpatialReference::Epsg(code)
    }
}

impl fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.normalized() {
            SpatialReference::Epsg(code) => write!(f, "{}", code),
            SpatialReference::Albers(aea) => write!(
                f,
                "Albers Equal Area (lat_1={}, lat_2={}, lat_0={}, lon_0={}, {:?})",
                aea.standard_parallel_1,
                aea.standard_parallel_2,
                aea.latitude_of_origin,
                aea.central_meridian,
                aea.datum
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}
