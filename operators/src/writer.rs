//! Encodes the scored array as a tiled COG and uploads it to object
//! storage (spec.md §4.8).

use crate::error::{self, Result};
use gdal::cpl::CslStringList;
use gdal::raster::Buffer;
use gdal::DriverManager;
use mcda_datatypes::{Grid2D, RasterGrid};
use object_store::{path::Path as StorePath, ObjectStore};
use snafu::ResultExt;
use std::sync::Arc;

const TILE_SIZE: usize = 512;

/// Writes `score` to a tiled, DEFLATE-compressed float32 COG and uploads
/// it to `store` under `results/mcda_result_<job_id>.tif`, returning
/// that key (spec.md §4.8's deterministic result key template).
pub struct ResultWriter {
    store: Arc<dyn ObjectStore>,
}

impl ResultWriter {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn write(&self, score: &Grid2D<f32>, grid: &RasterGrid, job_id: i64) -> Result<String> {
        let bytes = encode_cog(score, grid, job_id)?;
        let key = result_key(job_id);

        self.store
            .put(&StorePath::from(key.as_str()), bytes.into())
            .await
            .context(error::WriteFailed)?;

        Ok(key)
    }
}

pub fn result_key(job_id: i64) -> String {
    format!("results/mcda_result_{job_id}.tif")
}

/// Builds the in-memory GTiff bytes via GDAL's `/vsimem/` virtual
/// filesystem, so no temporary file ever touches disk. A fresh, unique
/// vsimem path per call lets concurrent writes in the same process not
/// collide.
fn encode_cog(score: &Grid2D<f32>, grid: &RasterGrid, job_id: i64) -> Result<Vec<u8>> {
    let shape = score.shape();
    let vsimem_path = format!("/vsimem/mcda_result_{job_id}.tif");

    let mut creation_options = CslStringList::new();
    for option in [
        "TILED=YES".to_string(),
        format!("BLOCKXSIZE={TILE_SIZE}"),
        format!("BLOCKYSIZE={TILE_SIZE}"),
        "COMPRESS=DEFLATE".to_string(),
    ] {
        creation_options
            .add_string(&option)
            .map_err(|source| error::Error::EncodeFailed {
                reason: source.to_string(),
            })?;
    }

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut dataset = driver
        .create_with_band_type_with_options::<f32, _>(
            &vsimem_path,
            shape.cols,
            shape.rows,
            1,
            &creation_options,
        )
        .context(error::Gdal)?;

    dataset
        .set_geo_transform(&[
            grid.transform.origin.x,
            grid.transform.x_pixel_size,
            0.0,
            grid.transform.origin.y,
            0.0,
            grid.transform.y_pixel_size,
        ])
        .context(error::Gdal)?;
    dataset
        .set_projection(&format!("EPSG:{}", grid.srs.epsg_code()))
        .context(error::Gdal)?;

    let mut band = dataset.rasterband(1).context(error::Gdal)?;
    band.set_no_data_value(Some(f64::from(crate::overlay::NODATA)))
        .context(error::Gdal)?;
    let buffer = Buffer::new((shape.cols, shape.rows), score.as_slice().to_vec());
    band.write((0, 0), (shape.cols, shape.rows), &buffer)
        .context(error::Gdal)?;

    drop(band);
    drop(dataset);

    let bytes = gdal::vsi::read_vsimem(&vsimem_path).context(error::Gdal)?;
    gdal::vsi::unlink_mem_file(&vsimem_path).ok();
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_key_matches_the_deterministic_template() {
        assert_eq!(result_key(42), "results/mcda_result_42.tif");
    }
}
