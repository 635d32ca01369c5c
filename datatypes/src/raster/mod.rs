mod geo_transform;
mod grid;
mod grid_shape;
mod no_data_mask;
mod pixel;
mod raster_grid;

pub use geo_transform::GeoTransform;
pub use grid::Grid2D;
pub use grid_shape::GridShape2D;
pub use no_data_mask::NoDataMask;
pub use pixel::Pixel;
pub use raster_grid::{RasterDataType, RasterGrid};
