use super::{BoundingBox2D, Coordinate2D};
use crate::error::{self, Result};
use serde::{Deserialize, Serialize};
use snafu::ensure;

/// Mean earth radius in kilometers, used for the area approximation below.
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// An Area of Interest: a simple closed polygon ring in WGS84 geographic
/// coordinates (longitude/latitude). No holes.
///
/// The ring is stored closed (first vertex repeats as the last), matching
/// the convention of most geometry wire formats (GeoJSON, WKT).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AoiPolygon {
    ring: Vec<Coordinate2D>,
}

impl AoiPolygon {
    /// Builds an AOI from a closed ring. Fails if the ring has fewer than
    /// 3 distinct vertices or is not closed.
    pub fn new(ring: Vec<Coordinate2D>) -> Result<Self> {
        ensure!(
            ring.len() >= 4,
            error::PolygonTooFewVertices { count: ring.len() }
        );
        let first = ring[0];
        let last = *ring.last().expect("checked non-empty above");
        ensure!(
            (first.x - last.x).abs() < 1e-9 && (first.y - last.y).abs() < 1e-9,
            error::PolygonRingNotClosed
        );
        Ok(Self { ring })
    }

    pub fn ring(&self) -> &[Coordinate2D] {
        &self.ring
    }

    /// Vertices with the closing duplicate dropped.
    fn unique_vertices(&self) -> &[Coordinate2D] {
        &self.ring[..self.ring.len() - 1]
    }

    /// Ray-casting (even-odd rule) point-in-polygon test over the ring's
    /// edges. Used to rasterize the AOI onto the AnalysisGrid: a pixel
    /// whose center lies inside the AOI's bounding box but outside the
    /// polygon itself is not "inside the AOI" (spec.md §1) and must not
    /// be scored.
    pub fn contains_point(&self, point: Coordinate2D) -> bool {
        let verts = self.unique_vertices();
        let n = verts.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let vi = verts[i];
            let vj = verts[j];
            if (vi.y > point.y) != (vj.y > point.y)
                && point.x < (vj.x - vi.x) * (point.y - vi.y) / (vj.y - vi.y) + vi.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    pub fn bounding_box(&self) -> BoundingBox2D {
        let verts = self.unique_vertices();
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for v in verts {
            min_x = min_x.min(v.x);
            min_y = min_y.min(v.y);
            max_x = max_x.max(v.x);
            max_y = max_y.max(v.y);
        }
        BoundingBox2D::new_unchecked(
            Coordinate2D::new(min_x, min_y),
            Coordinate2D::new(max_x, max_y),
        )
    }

    /// The mean latitude of the ring's vertices, used as the reference
    /// parallel for both the area approximation and the slope
    /// derivation's ground-pixel-size calculation (spec.md §9 Open
    /// Question (c): any stable equal-area choice is acceptable; this one
    /// is stable across repeated reads of the same polygon because it is
    /// a pure function of the ring).
    pub fn mid_latitude(&self) -> f64 {
        let verts = self.unique_vertices();
        verts.iter().map(|v| v.y).sum::<f64>() / verts.len() as f64
    }

    /// Approximate area in square kilometers, via a Lambert cylindrical
    /// equal-area projection referenced at `mid_latitude`, followed by
    /// the planar shoelace formula. Equal-area by construction, so the
    /// shoelace result is the true spherical-cap area to the precision of
    /// the spherical earth-radius approximation.
    pub fn area_km2(&self) -> f64 {
        let phi0 = self.mid_latitude().to_radians();
        let cos_phi0 = phi0.cos();
        let verts = self.unique_vertices();

        let projected: Vec<(f64, f64)> = verts
            .iter()
            .map(|v| {
                let lambda = v.x.to_radians();
                let phi = v.y.to_radians();
                let x = EARTH_RADIUS_KM * lambda * cos_phi0;
                let y = EARTH_RADIUS_KM * phi.sin() / cos_phi0;
                (x, y)
            })
            .collect();

        let mut sum = 0.0;
        for i in 0..projected.len() {
            let (x0, y0) = projected[i];
            let (x1, y1) = projected[(i + 1) % projected.len()];
            sum += x0 * y1 - x1 * y0;
        }
        (sum / 2.0).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(lon0: f64, lat0: f64, size: f64) -> AoiPolygon {
        AoiPolygon::new(vec![
            Coordinate2D::new(lon0, lat0),
            Coordinate2D::new(lon0 + size, lat0),
            Coordinate2D::new(lon0 + size, lat0 + size),
            Coordinate2D::new(lon0, lat0 + size),
            Coordinate2D::new(lon0, lat0),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_open_ring() {
        let ring = vec![
            Coordinate2D::new(0.0, 0.0),
            Coordinate2D::new(1.0, 0.0),
            Coordinate2D::new(1.0, 1.0),
        ];
        assert!(AoiPolygon::new(ring).is_err());
    }

    #[test]
    fn rejects_too_few_vertices() {
        let ring = vec![Coordinate2D::new(0.0, 0.0), Coordinate2D::new(0.0, 0.0)];
        assert!(AoiPolygon::new(ring).is_err());
    }

    #[test]
    fn one_degree_square_at_equator_is_about_111km_squared() {
        let aoi = square(0.0, 0.0, 1.0);
        let area = aoi.area_km2();
        assert!((10_000.0..15_000.0).contains(&area), "area was {area}");
    }

    #[test]
    fn area_is_stable_across_repeated_reads() {
        let aoi = square(10.0, 45.0, 0.5);
        assert_eq!(aoi.area_km2(), aoi.area_km2());
    }

    #[test]
    fn contains_point_accepts_interior_and_rejects_exterior() {
        let aoi = square(0.0, 0.0, 10.0);
        assert!(aoi.contains_point(Coordinate2D::new(5.0, 5.0)));
        assert!(!aoi.contains_point(Coordinate2D::new(15.0, 15.0)));
    }

    #[test]
    fn contains_point_rejects_bbox_corner_of_a_non_rectangular_aoi() {
        // A right triangle whose bounding box is the square [0,10]x[0,10];
        // (9, 9) sits in that bbox but outside the triangle itself.
        let triangle = AoiPolygon::new(vec![
            Coordinate2D::new(0.0, 0.0),
            Coordinate2D::new(10.0, 0.0),
            Coordinate2D::new(0.0, 10.0),
            Coordinate2D::new(0.0, 0.0),
        ])
        .unwrap();
        assert!(triangle.contains_point(Coordinate2D::new(1.0, 1.0)));
        assert!(!triangle.contains_point(Coordinate2D::new(9.0, 9.0)));
    }

    #[test]
    fn bounding_box_matches_vertex_extent() {
        let aoi = square(2.0, 3.0, 4.0);
        let bbox = aoi.bounding_box();
        assert_eq!(bbox.lower_left(), Coordinate2D::new(2.0, 3.0));
        assert_eq!(bbox.upper_right(), Coordinate2D::new(6.0, 7.0));
    }
}
