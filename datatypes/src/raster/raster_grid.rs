use super::{GeoTransform, GridShape2D};
use crate::primitives::SpatialReference;
use serde::{Deserialize, Serialize};

/// The pixel data type a source COG reports, mirroring the subset of
/// GDAL data types this engine's data lake actually uses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RasterDataType {
    F32,
    F64,
    U8,
    U16,
    I16,
}

/// Grid metadata for a raster: where it sits on the earth, how big it
/// is, and how no-data/typing works. This is the type named `RasterGrid`
/// in the data model (spec.md §3): both a `RasterSource`'s native grid
/// and the per-job `AnalysisGrid` the window aligner produces share this
/// shape.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterGrid {
    pub transform: GeoTransform,
    pub shape: GridShape2D,
    pub srs: SpatialReference,
    pub no_data_value: f64,
    pub data_type: RasterDataType,
}

impl RasterGrid {
    pub fn new(
        transform: GeoTransform,
        shape: GridShape2D,
        srs: SpatialReference,
        no_data_value: f64,
        data_type: RasterDataType,
    ) -> Self {
        Self {
            transform,
            shape,
            srs,
            no_data_value,
            data_type,
        }
    }

    /// Ground size of one pixel in meters, using a local equirectangular
    /// approximation at `reference_latitude` (spec.md §4.3). This is the
    /// one place pixel size in degrees is converted to meters; the slope
    /// derivation is this function's only caller.
    pub fn pixel_size_meters(&self, reference_latitude_deg: f64) -> (f64, f64) {
        const METERS_PER_DEGREE_LAT: f64 = 111_320.0;
        let lat_rad = reference_latitude_deg.to_radians();
        let x_m = self.transform.x_pixel_size.abs() * METERS_PER_DEGREE_LAT * lat_rad.cos();
        let y_m = self.transform.y_pixel_size.abs() * METERS_PER_DEGREE_LAT;
        (x_m, y_m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Coordinate2D;

    #[test]
    fn pixel_size_shrinks_toward_the_poles() {
        let grid = RasterGrid::new(
            GeoTransform::new(Coordinate2D::new(0.0, 0.0), 0.001, -0.001),
            GridShape2D::new(10, 10),
            SpatialReference::WGS84,
            -9999.0,
            RasterDataType::F32,
        );
        let (x_eq, _) = grid.pixel_size_meters(0.0);
        let (x_60, _) = grid.pixel_size_meters(60.0);
        assert!(x_60 < x_eq);
    }
}
