//! Computes the per-job AnalysisGrid and per-layer read plan (spec.md
//! §4.2). Aligning every layer to the primary solar layer's pixel
//! lattice up front is what lets every later stage (Normalizer,
//! ConstraintCompiler, WeightedOverlay, Statistics) be a pixel-wise,
//! embarrassingly parallel row-band operation with no per-layer
//! reprojection math of its own.

use crate::source::{LayerRef, Resampling};
use mcda_datatypes::{AoiPolygon, Coordinate2D, GridShape2D, NoDataMask, RasterGrid};

/// How one participating layer should be read against the AnalysisGrid.
#[derive(Debug, Clone)]
pub struct ReadPlan {
    pub layer: LayerRef,
    pub resampling: Resampling,
}

/// Aligns `layers` (primary first) to `primary`'s native pixel lattice,
/// cropped to `aoi`'s bounding box expanded outward to the nearest pixel
/// boundary (never shrinking the AOI, per spec.md §4.2).
pub fn align(primary: &RasterGrid, layers: &[LayerRef], aoi: &AoiPolygon) -> (RasterGrid, Vec<ReadPlan>) {
    let bbox = aoi.bounding_box();
    let transform = &primary.transform;

    let (r0, c0) = transform.coordinate_to_pixel(bbox.lower_left());
    let (r1, c1) = transform.coordinate_to_pixel(bbox.upper_right());

    let row_start = r0.min(r1).max(0) as usize;
    let row_end = ((r0.max(r1) + 1).max(0) as usize).min(primary.shape.rows);
    let col_start = c0.min(c1).max(0) as usize;
    let col_end = ((c0.max(c1) + 1).max(0) as usize).min(primary.shape.cols);

    // An AOI entirely outside the primary layer's coverage still yields a
    // well-formed, if degenerate, 1x1 window: every source read against
    // it returns all-no-data (spec.md §4.1's OutOfCoverage contract), not
    // an aligner error (spec.md §8's boundary-behavior scenario).
    let row_start = row_start.min(primary.shape.rows.saturating_sub(1));
    let col_start = col_start.min(primary.shape.cols.saturating_sub(1));
    let row_end = row_end.max(row_start + 1);
    let col_end = col_end.max(col_start + 1);

    let analysis_grid = RasterGrid::new(
        transform.windowed(row_start as isize, col_start as isize),
        GridShape2D::new(row_end - row_start, col_end - col_start),
        primary.srs,
        primary.no_data_value,
        primary.data_type,
    );

    let read_plans = layers
        .iter()
        .map(|layer_ref| ReadPlan {
            layer: layer_ref.clone(),
            resampling: if layer_ref.id.is_categorical() {
                Resampling::Nearest
            } else {
                Resampling::Bilinear
            },
        })
        .collect();

    (analysis_grid, read_plans)
}

/// Rasterizes `aoi`'s polygon onto `grid` (the AnalysisGrid `align`
/// produced), returning a mask where `true` marks a pixel whose center
/// falls inside the AOI's bounding box but outside the polygon itself.
/// `align` alone only crops to the bounding box; the original's
/// equivalent step is `rasterio.mask.mask(src, [aoi_geom], crop=True,
/// nodata=src.nodata)`
/// (examples/original_source/backend/workers/geoprocessing/mcda_engine.py),
/// which flags exactly these pixels as no-data. The caller ORs this into
/// the constraint-compiled exclusion mask before overlay, so the system
/// never scores or counts a pixel outside the AOI (spec.md §1).
pub fn rasterize_aoi_mask(grid: &RasterGrid, aoi: &AoiPolygon) -> NoDataMask {
    let shape = grid.shape;
    let mut flags = vec![false; shape.number_of_elements()];
    for row in 0..shape.rows {
        for col in 0..shape.cols {
            let corner = grid.transform.pixel_to_coordinate(row as isize, col as isize);
            let center = Coordinate2D::new(
                corner.x + 0.5 * grid.transform.x_pixel_size,
                corner.y + 0.5 * grid.transform.y_pixel_size,
            );
            if !aoi.contains_point(center) {
                flags[row * shape.cols + col] = true;
            }
        }
    }
    NoDataMask::from_vec(shape, flags).expect("flags is sized to shape.number_of_elements()")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LayerId;
    use async_trait::async_trait;
    use mcda_datatypes::{BoundingBox2D, Coordinate2D, GeoTransform, Grid2D, RasterDataType, SpatialReference};
    use std::sync::Arc;

    struct StubSource(RasterGrid);

    #[async_trait]
    impl crate::source::RasterSource for StubSource {
        fn grid(&self) -> RasterGrid {
            self.0
        }
        async fn read_window(
            &self,
            _bbox: BoundingBox2D,
        ) -> crate::error::Result<(Grid2D<f64>, GeoTransform)> {
            unimplemented!("not exercised by these tests")
        }
        async fn read_warped(
            &self,
            _target: &RasterGrid,
            _bbox: BoundingBox2D,
            _resampling: Resampling,
        ) -> crate::error::Result<Grid2D<f64>> {
            unimplemented!("not exercised by these tests")
        }
        async fn sample(&self, _coord: Coordinate2D) -> crate::error::Result<Option<f64>> {
            unimplemented!("not exercised by these tests")
        }
    }

    fn global_grid() -> RasterGrid {
        RasterGrid::new(
            GeoTransform::new(Coordinate2D::new(-180.0, 90.0), 0.01, -0.01),
            GridShape2D::new(18000, 36000),
            SpatialReference::WGS84,
            -9999.0,
            RasterDataType::F32,
        )
    }

    fn square_aoi(lon0: f64, lat0: f64, size: f64) -> AoiPolygon {
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
    fn window_covers_the_whole_aoi() {
        let primary = global_grid();
        let aoi = square_aoi(10.0, 45.0, 0.1);
        let (grid, _) = align(&primary, &[], &aoi);

        let ul = grid.transform.origin;
        let lr = grid
            .transform
            .pixel_to_coordinate(grid.shape.rows as isize, grid.shape.cols as isize);
        assert!(ul.x <= 10.0 && ul.y >= 45.1);
        assert!(lr.x >= 10.1 && lr.y <= 45.0);
    }

    #[test]
    fn lulc_layer_gets_nearest_resampling_and_continuous_layers_get_bilinear() {
        let primary = global_grid();
        let lulc = LayerRef {
            id: LayerId::Lulc,
            source: Arc::new(StubSource(primary)),
        };
        let ghi = LayerRef {
            id: LayerId::Ghi,
            source: Arc::new(StubSource(primary)),
        };
        let aoi = square_aoi(0.0, 0.0, 0.1);
        let (_, plans) = align(&primary, &[lulc, ghi], &aoi);

        assert_eq!(plans[0].resampling, Resampling::Nearest);
        assert_eq!(plans[1].resampling, Resampling::Bilinear);
    }

    #[test]
    fn aoi_outside_coverage_still_yields_a_well_formed_window() {
        let primary = RasterGrid::new(
            GeoTransform::new(Coordinate2D::new(0.0, 1.0), 0.01, -0.01),
            GridShape2D::new(100, 100),
            SpatialReference::WGS84,
            -9999.0,
            RasterDataType::F32,
        );
        // Far outside the small primary grid's footprint.
        let aoi = square_aoi(50.0, 50.0, 0.1);
        let (grid, _) = align(&primary, &[], &aoi);
        assert!(grid.shape.rows >= 1 && grid.shape.cols >= 1);
    }

    #[test]
    fn rasterize_aoi_mask_excludes_bbox_corners_outside_a_triangular_aoi() {
        let primary = RasterGrid::new(
            GeoTransform::new(Coordinate2D::new(0.0, 10.0), 1.0, -1.0),
            GridShape2D::new(10, 10),
            SpatialReference::WGS84,
            -9999.0,
            RasterDataType::F32,
        );
        let triangle = AoiPolygon::new(vec![
            Coordinate2D::new(0.0, 0.0),
            Coordinate2D::new(10.0, 0.0),
            Coordinate2D::new(0.0, 10.0),
            Coordinate2D::new(0.0, 0.0),
        ])
        .unwrap();
        let (grid, _) = align(&primary, &[], &triangle);
        let mask = rasterize_aoi_mask(&grid, &triangle);

        // Pixel near the polygon's right-angle corner is inside.
        assert!(!mask.get(8, 1));
        // Pixel near the bbox corner opposite the hypotenuse is outside.
        assert!(mask.get(1, 8));
    }
}
