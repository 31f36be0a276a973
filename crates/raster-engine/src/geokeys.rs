//! GeoTIFF GeoKey directory encoding and decoding.

use crate::error::{EngineError, Result};
use scenario_common::{AlbersEqualArea, CrsCode, Datum, SpatialReference};
use std::collections::BTreeMap;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const GEOG_GEODETIC_DATUM: u16 = 2050;
const GEOG_ANGULAR_UNITS: u16 = 2054;
const PROJECTED_CS_TYPE: u16 = 3072;
const PROJECTION: u16 = 3074;
const PROJ_COORD_TRANS: u16 = 3075;
const PROJ_LINEAR_UNITS: u16 = 3076;
const PROJ_STD_PARALLEL_1: u16 = 3078;
const PROJ_STD_PARALLEL_2: u16 = 3079;
const PROJ_NAT_ORIGIN_LONG: u16 = 3080;
const PROJ_NAT_ORIGIN_LAT: u16 = 3081;
const PROJ_FALSE_EASTING: u16 = 3082;
const PROJ_FALSE_NORTHING: u16 = 3083;
const PROJ_FALSE_ORIGIN_LONG: u16 = 3084;
const PROJ_FALSE_ORIGIN_LAT: u16 = 3085;
const PROJ_FALSE_ORIGIN_EASTING: u16 = 3086;
const PROJ_FALSE_ORIGIN_NORTHING: u16 = 3087;
const PROJ_CENTER_LONG: u16 = 3088;
const PROJ_CENTER_LAT: u16 = 3089;

const MODEL_PROJECTED: u16 = 1;
const MODEL_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u16 = 32767;
const CT_ALBERS_EQUAL_AREA: u16 = 11;
const LINEAR_METER: u16 = 9001;
const ANGULAR_DEGREE: u16 = 9102;

/// TIFF tag holding double-valued keys.
pub const GEO_DOUBLE_PARAMS_TAG: u16 = 34736;

/// Encoded GeoKeys: the directory and its double parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoKeys {
    pub directory: Vec<u16>,
    pub doubles: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum KeyValue {
    Short(u16),
    Double(f64),
}

impl KeyValue {
    fn as_short(&self) -> Option<u16> {
        match self {
            KeyValue::Short(v) => Some(*v),
            KeyValue::Double(_) => None,
        }
    }

    fn as_double(&self) -> Option<f64> {
        match self {
            KeyValue::Double(v) => Some(*v),
            KeyValue::Short(v) => Some(f64::from(*v)),
        }
    }
}

/// Build the GeoKey directory describing `sr`.
pub fn encode(sr: &SpatialReference) -> GeoKeys {
    let mut keys: BTreeMap<u16, KeyValue> = BTreeMap::new();
    keys.insert(GT_RASTER_TYPE, KeyValue::Short(RASTER_PIXEL_IS_AREA));

    match sr.normalized() {
        SpatialReference::Epsg(code) if code.is_geographic() => {
            keys.insert(GT_MODEL_TYPE, KeyValue::Short(MODEL_GEOGRAPHIC));
            keys.insert(GEOGRAPHIC_TYPE, KeyValue::Short(code.epsg()));
            keys.insert(GEOG_ANGULAR_UNITS, KeyValue::Short(ANGULAR_DEGREE));
        }
        SpatialReference::Epsg(code) => {
            keys.insert(GT_MODEL_TYPE, KeyValue::Short(MODEL_PROJECTED));
            keys.insert(PROJECTED_CS_TYPE, KeyValue::Short(code.epsg()));
            keys.insert(PROJ_LINEAR_UNITS, KeyValue::Short(LINEAR_METER));
        }
        SpatialReference::Albers(aea) => {
            let geographic = match aea.datum {
                Datum::Wgs84 => CrsCode::Epsg4326,
                Datum::Nad83 => CrsCode::Epsg4269,
            };
            keys.insert(GT_MODEL_TYPE, KeyValue::Short(MODEL_PROJECTED));
            keys.insert(GEOGRAPHIC_TYPE, KeyValue::Short(geographic.epsg()));
            keys.insert(PROJECTED_CS_TYPE, KeyValue::Short(USER_DEFINED));
            keys.insert(PROJECTION, KeyValue::Short(USER_DEFINED));
            keys.insert(PROJ_COORD_TRANS, KeyValue::Short(CT_ALBERS_EQUAL_AREA));
            keys.insert(PROJ_LINEAR_UNITS, KeyValue::Short(LINEAR_METER));
            keys.insert(PROJ_STD_PARALLEL_1, KeyValue::Double(aea.standard_parallel_1));
            keys.insert(PROJ_STD_PARALLEL_2, KeyValue::Double(aea.standard_parallel_2));
            keys.insert(PROJ_NAT_ORIGIN_LONG, KeyValue::Double(aea.central_meridian));
            keys.insert(PROJ_NAT_ORIGIN_LAT, KeyValue::Double(aea.latitude_of_origin));
            keys.insert(PROJ_FALSE_EASTING, KeyValue::Double(aea.false_easting));
            keys.insert(PROJ_FALSE_NORTHING, KeyValue::Double(aea.false_northing));
        }
    }

    let mut directory = vec![1, 1, 0, keys.len() as u16];
    let mut doubles = Vec::new();
    for (key, value) in keys {
        match value {
            KeyValue::Short(v) => directory.extend_from_slice(&[key, 0, 1, v]),
            KeyValue::Double(v) => {
                directory.extend_from_slice(&[
                    key,
                    GEO_DOUBLE_PARAMS_TAG,
                    1,
                    doubles.len() as u16,
                ]);
                doubles.push(v);
            }
        }
    }

    GeoKeys { directory, doubles }
}

/// Interpret a GeoKey directory.
pub fn decode(directory: &[u16], doubles: &[f64]) -> Result<SpatialReference> {
    let keys = parse_directory(directory, doubles)?;
    let short = |key: u16| keys.get(&key).and_then(KeyValue::as_short);
    let double = |keys_in_order: &[u16]| {
        keys_in_order
            .iter()
            .find_map(|k| keys.get(k).and_then(KeyValue::as_double))
    };

    let model = short(GT_MODEL_TYPE);
    let projected = short(PROJECTED_CS_TYPE);

    if let Some(code) = projected.filter(|c| *c != USER_DEFINED) {
        return CrsCode::from_epsg(code)
            .map(SpatialReference::Epsg)
            .ok_or_else(|| EngineError::raster_format(format!("unsupported projected CRS EPSG:{code}")));
    }

    if model == Some(MODEL_GEOGRAPHIC) {
        let code = short(GEOGRAPHIC_TYPE).unwrap_or(0);
        return CrsCode::from_epsg(code)
            .filter(CrsCode::is_geographic)
            .map(SpatialReference::Epsg)
            .ok_or_else(|| EngineError::raster_format(format!("unsupported geographic CRS EPSG:{code}")));
    }

    match short(PROJ_COORD_TRANS) {
        Some(CT_ALBERS_EQUAL_AREA) => {
            let required = |name: &str, ks: &[u16]| {
                double(ks).ok_or_else(|| {
                    EngineError::raster_format(format!("Albers projection is missing {name}"))
                })
            };
            let aea = AlbersEqualArea {
                standard_parallel_1: required("standard parallel 1", &[PROJ_STD_PARALLEL_1])?,
                standard_parallel_2: required("standard parallel 2", &[PROJ_STD_PARALLEL_2])?,
                latitude_of_origin: required(
                    "latitude of origin",
                    &[PROJ_NAT_ORIGIN_LAT, PROJ_FALSE_ORIGIN_LAT, PROJ_CENTER_LAT],
                )?,
                central_meridian: required(
                    "central meridian",
                    &[PROJ_NAT_ORIGIN_LONG, PROJ_FALSE_ORIGIN_LONG, PROJ_CENTER_LONG],
                )?,
                false_easting: double(&[PROJ_FALSE_EASTING, PROJ_FALSE_ORIGIN_EASTING])
                    .unwrap_or(0.0),
                false_northing: double(&[PROJ_FALSE_NORTHING, PROJ_FALSE_ORIGIN_NORTHING])
                    .unwrap_or(0.0),
                datum: datum_of(short(GEOGRAPHIC_TYPE), short(GEOG_GEODETIC_DATUM)),
            };
            Ok(SpatialReference::Albers(aea).normalized())
        }
        Some(other) => Err(EngineError::raster_format(format!(
            "unsupported coordinate transformation {other}"
        ))),
        None => Err(EngineError::raster_format(
            "GeoKey directory does not describe a CRS",
        )),
    }
}

fn datum_of(geographic: Option<u16>, datum: Option<u16>) -> Datum {
    match (geographic, datum) {
        (Some(4269), _) | (_, Some(6269)) => Datum::Nad83,
        _ => Datum::Wgs84,
    }
}

fn parse_directory(directory: &[u16], doubles: &[f64]) -> Result<BTreeMap<u16, KeyValue>> {
    if directory.len() < 4 {
        return Err(EngineError::raster_format("GeoKey directory header is truncated"));
    }
    let count = directory[3] as usize;
    if directory.len() < 4 + count * 4 {
        return Err(EngineError::raster_format(format!(
            "GeoKey directory declares {count} keys but holds {}",
            (directory.len() - 4) / 4
        )));
    }

    let mut keys = BTreeMap::new();
    for entry in directory[4..4 + count * 4].chunks_exact(4) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        match location {
            0 => {
                keys.insert(key, KeyValue::Short(value));
            }
            GEO_DOUBLE_PARAMS_TAG => {
                let v = doubles.get(value as usize).ok_or_else(|| {
                    EngineError::raster_format(format!("GeoKey {key} points past the double params"))
                })?;
                keys.insert(key, KeyValue::Double(*v));
            }
            // ASCII citations and other locations carry nothing we interpret.
            _ => {}
        }
    }
    Ok(keys)
}
