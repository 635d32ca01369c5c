//! Geometry and raster primitives shared by the geoprocessing engine and
//! the job-lifecycle services.

pub mod error;
pub mod primitives;
pub mod raster;

pub use error::Error;
pub use primitives::{AoiPolygon, BoundingBox2D, Coordinate2D, SpatialReference};
pub use raster::{GeoTransform, Grid2D, GridShape2D, NoDataMask, Pixel, RasterDataType, RasterGrid};
