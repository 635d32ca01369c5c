//! Aggregate statistics over the scored raster (spec.md §4.7).

use mcda_datatypes::{Grid2D, NoDataMask};
use serde::{Deserialize, Serialize};

/// Fixed aggregate computed over `valid = !nodata && !excluded`
/// (spec.md §4.7). All-zero numeric fields when `valid_pixels == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_pixels: usize,
    pub valid_pixels: usize,
    pub excluded_pixels: usize,
    pub mean_suitability: f64,
    pub min_suitability: f64,
    pub max_suitability: f64,
    pub std_suitability: f64,
}

pub fn compute(score: &Grid2D<f32>, mask: &NoDataMask) -> Statistics {
    let shape = score.shape();
    let total_pixels = shape.number_of_elements();
    let excluded_pixels = mask.count_true();

    let valid: Vec<f64> = (0..shape.rows)
        .flat_map(|row| (0..shape.cols).map(move |col| (row, col)))
        .filter(|&(row, col)| !mask.get(row, col) && !score.is_no_data_at(row, col))
        .map(|(row, col)| f64::from(score.get_unchecked(row, col)))
        .collect();

    if valid.is_empty() {
        return Statistics {
            total_pixels,
            valid_pixels: 0,
            excluded_pixels,
            mean_suitability: 0.0,
            min_suitability: 0.0,
            max_suitability: 0.0,
            std_suitability: 0.0,
        };
    }

    let valid_pixels = valid.len();
    let mean = valid.iter().sum::<f64>() / valid_pixels as f64;
    let min = valid.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = valid.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let variance =
        valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / valid_pixels as f64;

    Statistics {
        total_pixels,
        valid_pixels,
        excluded_pixels,
        mean_suitability: mean,
        min_suitability: min,
        max_suitability: max,
        std_suitability: variance.sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcda_datatypes::GridShape2D;

    #[test]
    fn uniform_score_has_zero_std_and_matching_min_max_mean() {
        let shape = GridShape2D::new(2, 2);
        let score = Grid2D::filled(shape, -9999.0, 75.0_f32);
        let mask = NoDataMask::new_all_false(shape);
        let stats = compute(&score, &mask);
        assert_eq!(stats.total_pixels, 4);
        assert_eq!(stats.valid_pixels, 4);
        assert_eq!(stats.excluded_pixels, 0);
        assert_eq!(stats.mean_suitability, 75.0);
        assert_eq!(stats.min_suitability, 75.0);
        assert_eq!(stats.max_suitability, 75.0);
        assert_eq!(stats.std_suitability, 0.0);
    }

    #[test]
    fn all_excluded_or_no_data_zeroes_every_numeric_field() {
        let shape = GridShape2D::new(1, 2);
        let score = Grid2D::all_no_data(shape, -9999.0_f32);
        let mask = NoDataMask::new_all_false(shape);
        let stats = compute(&score, &mask);
        assert_eq!(stats.valid_pixels, 0);
        assert_eq!(stats.mean_suitability, 0.0);
        assert_eq!(stats.std_suitability, 0.0);
    }

    #[test]
    fn excluded_pixels_counted_independent_of_score_no_data() {
        let shape = GridShape2D::new(1, 2);
        let score = Grid2D::from_vec(shape, -9999.0, vec![50.0, -9999.0]).unwrap();
        let mut mask = NoDataMask::new_all_false(shape);
        mask.set(0, 1, true);
        let stats = compute(&score, &mask);
        assert_eq!(stats.excluded_pixels, 1);
        assert_eq!(stats.valid_pixels, 1);
        assert_eq!(stats.mean_suitability, 50.0);
    }

    #[test]
    fn population_standard_deviation_matches_hand_computation() {
        let shape = GridShape2D::new(1, 4);
        let score = Grid2D::from_vec(shape, -9999.0, vec![10.0, 20.0, 30.0, 40.0]).unwrap();
        let mask = NoDataMask::new_all_false(shape);
        let stats = compute(&score, &mask);
        assert_eq!(stats.mean_suitability, 25.0);
        assert!((stats.std_suitability - 11.180339887498949).abs() < 1e-9);
    }
}
