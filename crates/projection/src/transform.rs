//! Point transformation between two spatial references.

use crate::error::{ProjectionError, Result};
use proj4rs::proj::Proj;
use scenario_common::SpatialReference;

/// A source→target transformation built once and reused for every vertex.
///
/// proj4rs works in radians for geographic systems; this wrapper accepts and
/// returns degrees so callers only ever see native CRS units.
pub struct CrsTransform {
    source: SpatialReference,
    target: SpatialReference,
    source_proj: Proj,
    target_proj: Proj,
}

impl std::fmt::Debug for CrsTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrsTransform")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl CrsTransform {
    /// Build the transformation, failing if either definition is rejected.
    pub fn new(source: SpatialReference, target: SpatialReference) -> Result<Self> {
        let source_proj = build_proj(&source)?;
        let target_proj = build_proj(&target)?;

        Ok(Self {
            source,
            target,
            source_proj,
            target_proj,
        })
    }

    pub fn source(&self) -> &SpatialReference {
        &self.source
    }

    pub fn target(&self) -> &SpatialReference {
        &self.target
    }

    /// True when source and target describe the same CRS.
    pub fn is_identity(&self) -> bool {
        self.source.is_equivalent(&self.target)
    }

    /// Transform one coordinate from source to target.
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if self.is_identity() {
            return Ok((x, y));
        }

        let mut point = if self.source.is_geographic() {
            if !(-90.0..=90.0).contains(&y) {
                return Err(ProjectionError::TransformFailed {
                    x,
                    y,
                    reason: "latitude out of range".to_string(),
                });
            }
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        proj4rs::transform::transform(&self.source_proj, &self.target_proj, &mut point).map_err(
            |e| ProjectionError::TransformFailed {
                x,
                y,
                reason: format!("{e:?}"),
            },
        )?;

        let (out_x, out_y) = if self.target.is_geographic() {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !out_x.is_finite() || !out_y.is_finite() {
            return Err(ProjectionError::TransformFailed {
                x,
                y,
                reason: "non-finite result".to_string(),
            });
        }

        Ok((out_x, out_y))
    }
}

fn build_proj(sr: &SpatialReference) -> Result<Proj> {
    let definition = sr.proj_definition();
    Proj::from_proj_string(&definition).map_err(|e| ProjectionError::UnknownCrs {
        crs: sr.to_string(),
        reason: format!("{e:?}"),
    })
}
