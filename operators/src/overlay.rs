//! Weighted overlay (spec.md §4.6): the actual "multi-criteria decision
//! analysis" sum. Every other module in this crate exists to produce
//! this function's inputs.

use crate::catalog::FactorId;
use mcda_datatypes::{Grid2D, GridShape2D, NoDataMask};
use rayon::prelude::*;
use std::collections::HashMap;

/// The sentinel spec.md §6 calls `NODATA`, carried on every engine
/// output raster.
pub const NODATA: f32 = -9999.0;

/// `score = sum(weight_k/100 * normalized_k)`, no-data propagating from
/// any contributing layer, the exclusion mask applied last (spec.md
/// §4.6). Panics if `normalized` is missing an entry for a factor with
/// nonzero weight or if any entry's shape disagrees with `shape` — both
/// are pipeline bugs, not job-data problems, since admission already
/// validated the weight/factor closure.
pub fn overlay(
    normalized: &HashMap<FactorId, Grid2D<f64>>,
    weights: &HashMap<FactorId, f64>,
    mask: &NoDataMask,
    shape: GridShape2D,
) -> Grid2D<f32> {
    let contributing: Vec<(&Grid2D<f64>, f64)> = weights
        .iter()
        .filter(|&(_, &w)| w > 0.0)
        .map(|(factor, &w)| {
            let grid = normalized
                .get(factor)
                .unwrap_or_else(|| panic!("no normalized array resolved for factor {factor:?}"));
            assert_eq!(
                grid.shape(),
                shape,
                "normalized layer for {factor:?} does not share the AnalysisGrid shape"
            );
            (grid, w / 100.0)
        })
        .collect();

    let mut out = vec![NODATA; shape.number_of_elements()];
    out.par_chunks_mut(shape.cols.max(1))
        .enumerate()
        .for_each(|(row, out_row)| {
            for (col, out_px) in out_row.iter_mut().enumerate() {
                if mask.get(row, col) {
                    continue;
                }
                let mut sum = 0.0_f64;
                let mut any_no_data = false;
                for (grid, weight) in &contributing {
                    if grid.is_no_data_at(row, col) {
                        any_no_data = true;
                        break;
                    }
                    sum += weight * grid.get_unchecked(row, col);
                }
                if !any_no_data {
                    *out_px = sum as f32;
                }
            }
        });

    Grid2D::from_vec(shape, NODATA, out).expect("out is sized to shape.number_of_elements()")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_grid(shape: GridShape2D, value: f64) -> Grid2D<f64> {
        Grid2D::filled(shape, -9999.0, value)
    }

    #[test]
    fn every_factor_at_max_and_no_exclusion_scores_exactly_100() {
        let shape = GridShape2D::new(2, 2);
        let mut normalized = HashMap::new();
        normalized.insert(FactorId::Ghi, full_grid(shape, 100.0));
        normalized.insert(FactorId::Slope, full_grid(shape, 100.0));
        let mut weights = HashMap::new();
        weights.insert(FactorId::Ghi, 60.0);
        weights.insert(FactorId::Slope, 40.0);
        let mask = NoDataMask::new_all_false(shape);

        let score = overlay(&normalized, &weights, &mask, shape);
        for v in score.as_slice() {
            assert!((*v - 100.0).abs() < 1e-5, "{v}");
        }
    }

    #[test]
    fn no_data_in_any_contributor_propagates() {
        let shape = GridShape2D::new(1, 1);
        let mut normalized = HashMap::new();
        normalized.insert(FactorId::Ghi, full_grid(shape, 50.0));
        normalized.insert(FactorId::Slope, Grid2D::all_no_data(shape, -9999.0));
        let mut weights = HashMap::new();
        weights.insert(FactorId::Ghi, 50.0);
        weights.insert(FactorId::Slope, 50.0);
        let mask = NoDataMask::new_all_false(shape);

        let score = overlay(&normalized, &weights, &mask, shape);
        assert_eq!(score.get_unchecked(0, 0), NODATA);
    }

    #[test]
    fn excluded_pixels_become_no_data_even_when_scorable() {
        let shape = GridShape2D::new(1, 1);
        let mut normalized = HashMap::new();
        normalized.insert(FactorId::Ghi, full_grid(shape, 100.0));
        let mut weights = HashMap::new();
        weights.insert(FactorId::Ghi, 100.0);
        let mut mask = NoDataMask::new_all_false(shape);
        mask.set(0, 0, true);

        let score = overlay(&normalized, &weights, &mask, shape);
        assert_eq!(score.get_unchecked(0, 0), NODATA);
    }

    #[test]
    fn zero_weight_factors_are_skipped_even_without_a_resolved_array() {
        let shape = GridShape2D::new(1, 1);
        let mut normalized = HashMap::new();
        normalized.insert(FactorId::Ghi, full_grid(shape, 80.0));
        let mut weights = HashMap::new();
        weights.insert(FactorId::Ghi, 100.0);
        weights.insert(FactorId::Dni, 0.0);
        let mask = NoDataMask::new_all_false(shape);

        let score = overlay(&normalized, &weights, &mask, shape);
        assert_eq!(score.get_unchecked(0, 0), 80.0);
    }
}
