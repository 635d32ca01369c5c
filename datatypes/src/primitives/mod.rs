mod aoi_polygon;
mod bounding_box;
mod spatial_reference;

pub use aoi_polygon::AoiPolygon;
pub use bounding_box::BoundingBox2D;
pub use spatial_reference::SpatialReference;

use serde::{Deserialize, Serialize};

/// A point in geographic coordinates (longitude, latitude), WGS84.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate2D {
    pub x: f64,
    pub y: f64,
}

impl Coordinate2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Coordinate2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}
