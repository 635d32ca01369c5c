use super::Coordinate2D;
use crate::error::{self, Result};
use serde::{Deserialize, Serialize};
use snafu::ensure;

/// An axis-aligned bounding box in geographic coordinates.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox2D {
    lower_left: Coordinate2D,
    upper_right: Coordinate2D,
}

impl BoundingBox2D {
    pub fn new(lower_left: Coordinate2D, upper_right: Coordinate2D) -> Result<Self> {
        ensure!(
            lower_left.x <= upper_right.x && lower_left.y <= upper_right.y,
            error::DegenerateBoundingBox {
                lower_left,
                upper_right
            }
        );
        Ok(Self {
            lower_left,
            upper_right,
        })
    }

    /// Builds a box without checking the ordering invariant. Only use when
    /// the caller already established `lower_left <= upper_right`, e.g.
    /// from min/max folds over known-good points.
    pub fn new_unchecked(lower_left: Coordinate2D, upper_right: Coordinate2D) -> Self {
        Self {
            lower_left,
            upper_right,
        }
    }

    pub fn lower_left(&self) -> Coordinate2D {
        self.lower_left
    }

    pub fn upper_right(&self) -> Coordinate2D {
        self.upper_right
    }

    pub fn width(&self) -> f64 {
        self.upper_right.x - self.lower_left.x
    }

    pub fn height(&self) -> f64 {
        self.upper_right.y - self.lower_left.y
    }

    pub fn center(&self) -> Coordinate2D {
        Coordinate2D::new(
            (self.lower_left.x + self.upper_right.x) / 2.0,
            (self.lower_left.y + self.upper_right.y) / 2.0,
        )
    }

    pub fn contains_coordinate(&self, coord: Coordinate2D) -> bool {
        coord.x >= self.lower_left.x
            && coord.x <= self.upper_right.x
            && coord.y >= self.lower_left.y
            && coord.y <= self.upper_right.y
    }

    pub fn intersects(&self, other: &BoundingBox2D) -> bool {
        self.lower_left.x <= other.upper_right.x
            && self.upper_right.x >= other.lower_left.x
            && self.lower_left.y <= other.upper_right.y
            && self.upper_right.y >= other.lower_left.y
    }

    /// The intersection of two boxes, or `None` if they are disjoint.
    pub fn intersection(&self, other: &BoundingBox2D) -> Option<BoundingBox2D> {
        if !self.intersects(other) {
            return None;
        }
        let lower_left = Coordinate2D::new(
            self.lower_left.x.max(other.lower_left.x),
            self.lower_left.y.max(other.lower_left.y),
        );
        let upper_right = Coordinate2D::new(
            self.upper_right.x.min(other.upper_right.x),
            self.upper_right.y.min(other.upper_right.y),
        );
        Some(BoundingBox2D::new_unchecked(lower_left, upper_right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_box() {
        let res = BoundingBox2D::new(Coordinate2D::new(1.0, 1.0), Coordinate2D::new(0.0, 2.0));
        assert!(res.is_err());
    }

    #[test]
    fn intersection_of_overlapping_boxes() {
        let a = BoundingBox2D::new(Coordinate2D::new(0.0, 0.0), Coordinate2D::new(10.0, 10.0))
            .unwrap();
        let b = BoundingBox2D::new(Coordinate2D::new(5.0, 5.0), Coordinate2D::new(15.0, 15.0))
            .unwrap();
        let i = a.intersection(&b).unwrap();
        assert_eq!(i.lower_left(), Coordinate2D::new(5.0, 5.0));
        assert_eq!(i.upper_right(), Coordinate2D::new(10.0, 10.0));
    }

    #[test]
    fn disjoint_boxes_have_no_intersection() {
        let a = BoundingBox2D::new(Coordinate2D::new(0.0, 0.0), Coordinate2D::new(1.0, 1.0))
            .unwrap();
        let b = BoundingBox2D::new(Coordinate2D::new(5.0, 5.0), Coordinate2D::new(6.0, 6.0))
            .unwrap();
        assert!(a.intersection(&b).is_none());
    }
}
