//! Polygon reprojection from the client CRS into the working grid CRS.

use crate::error::{ProjectionError, Result};
use crate::transform::CrsTransform;
use geo::{Area, Coord, Geometry, MapCoords, MultiPolygon};
use scenario_common::SpatialReference;
use tracing::warn;
use wkt::{ToWkt, TryFromWkt};

/// Parse WKT into a multipolygon.
///
/// Accepts POLYGON and MULTIPOLYGON (a geometry collection of polygons is
/// flattened). Anything else, or a geometry without area, is rejected.
pub fn parse_polygonal(text: &str) -> Result<MultiPolygon<f64>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ProjectionError::empty_geometry("empty WKT string"));
    }

    let geometry = Geometry::<f64>::try_from_wkt_str(trimmed)
        .map_err(|e| ProjectionError::empty_geometry(format!("unparseable WKT: {e}")))?;

    let polygons = collect_polygons(geometry)?;
    if polygons.0.is_empty() || polygons.unsigned_area() <= 0.0 {
        return Err(ProjectionError::empty_geometry("geometry has no area"));
    }

    Ok(polygons)
}

fn collect_polygons(geometry: Geometry<f64>) -> Result<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Ok(mp),
        Geometry::Rect(r) => Ok(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::GeometryCollection(gc) => {
            let mut polygons = Vec::new();
            for g in gc {
                polygons.extend(collect_polygons(g)?.0);
            }
            Ok(MultiPolygon::new(polygons))
        }
        other => Err(ProjectionError::empty_geometry(format!(
            "expected a polygonal geometry, got {}",
            geometry_kind(&other)
        ))),
    }
}

fn geometry_kind(g: &Geometry<f64>) -> &'static str {
    match g {
        Geometry::Point(_) => "POINT",
        Geometry::Line(_) | Geometry::LineString(_) => "LINESTRING",
        Geometry::MultiPoint(_) => "MULTIPOINT",
        Geometry::MultiLineString(_) => "MULTILINESTRING",
        Geometry::Triangle(_) => "TRIANGLE",
        _ => "POLYGONAL",
    }
}

/// Render a multipolygon as WKT.
pub fn to_wkt(geometry: &MultiPolygon<f64>) -> String {
    geometry.wkt_string()
}

/// Transforms client polygons into the grid's CRS.
///
/// The underlying transformation is constructed once; every call reuses it.
#[derive(Debug)]
pub struct Reprojector {
    transform: CrsTransform,
}

impl Reprojector {
    pub fn new(source: SpatialReference, target: SpatialReference) -> Result<Self> {
        Ok(Self {
            transform: CrsTransform::new(source, target)?,
        })
    }

    pub fn source(&self) -> &SpatialReference {
        self.transform.source()
    }

    pub fn target(&self) -> &SpatialReference {
        self.transform.target()
    }

    /// Parse `wkt` in the source CRS and return it in the target CRS.
    ///
    /// The first vertex that cannot be transformed fails the whole geometry
    /// with `TransformFailed`. Fails with `NoOpTransform` when source and
    /// target differ but the output WKT is identical to the input.
    pub fn reproject(&self, wkt: &str) -> Result<MultiPolygon<f64>> {
        let geometry = parse_polygonal(wkt)?;
        if self.transform.is_identity() {
            return Ok(geometry);
        }

        let projected = self.reproject_geometry(&geometry).map_err(|e| {
            warn!(error = %e, wkt = %wkt, "failed to reproject parcel geometry");
            e
        })?;

        if to_wkt(&projected) == to_wkt(&geometry) {
            return Err(ProjectionError::NoOpTransform {
                source_crs: self.source().to_string(),
                target_crs: self.target().to_string(),
            });
        }

        Ok(projected)
    }

    /// Transform every vertex of an already parsed geometry.
    pub fn reproject_geometry(&self, geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        let transform = &self.transform;
        geometry.try_map_coords(|c: Coord<f64>| -> Result<Coord<f64>> {
            let (x, y) = transform.transform(c.x, c.y)?;
            Ok(Coord { x, y })
        })
    }
}
