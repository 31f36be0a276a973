//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in projected or geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True when every corner is a finite number.
    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }

    /// True when the box has no area (or is inverted / non-finite).
    pub fn is_degenerate(&self) -> bool {
        !self.is_finite() || self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Grow the box by `distance` on every side.
    ///
    /// For a rectangle this equals the envelope of buffering any geometry
    /// with these bounds by `distance`.
    pub fn expand(&self, distance: f64) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x - distance,
            min_y: self.min_y - distance,
            max_x: self.max_x + distance,
            max_y: self.max_y + distance,
        }
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions() {
        let bbox = BoundingBox::new(-10.0, 5.0, 20.0, 45.0);
        assert_eq!(bbox.width(), 30.0);
        assert_eq!(bbox.height(), 40.0);
        assert!(!bbox.is_degenerate());
    }

    #[test]
    fn test_degenerate() {
        assert!(BoundingBox::new(0.0, 0.0, 0.0, 10.0).is_degenerate());
        assert!(BoundingBox::new(0.0, 0.0, 10.0, -1.0).is_degenerate());
        assert!(BoundingBox::new(f64::NAN, 0.0, 10.0, 10.0).is_degenerate());
        assert!(BoundingBox::new(0.0, 0.0, f64::INFINITY, 10.0).is_degenerate());
    }

    #[test]
    fn test_expand() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 4.0).expand(4.0);
        assert_eq!(bbox, BoundingBox::new(-4.0, -4.0, 14.0, 8.0));
    }
}
