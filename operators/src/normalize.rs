//! Maps a factor array to 0-100 (spec.md §4.4). The only place
//! factor-specific semantics (clip bounds, inversion) enter the pipeline;
//! everything downstream of this module treats every factor identically.

use crate::error::{self, Result};
use mcda_datatypes::Grid2D;
use snafu::ensure;

/// `t = clip(A, min, max)` scaled to `[0, 100]`, inverted first when
/// `invert` (spec.md §4.4's formula, exactly). No-data pixels pass
/// through unchanged.
pub fn normalize(values: &Grid2D<f64>, min: f64, max: f64, invert: bool) -> Result<Grid2D<f64>> {
    ensure!(max > min, error::InvalidNormalizeBounds { min, max });

    Ok(values.map_valid_parallel(move |v| {
        let clipped = v.clamp(min, max);
        let mut t = (clipped - min) / (max - min);
        if invert {
            t = 1.0 - t;
        }
        100.0 * t
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcda_datatypes::GridShape2D;

    fn grid(values: Vec<f64>) -> Grid2D<f64> {
        Grid2D::from_vec(GridShape2D::new(1, values.len()), -9999.0, values).unwrap()
    }

    #[test]
    fn rejects_degenerate_bounds() {
        assert!(normalize(&grid(vec![1.0]), 5.0, 5.0, false).is_err());
        assert!(normalize(&grid(vec![1.0]), 5.0, 1.0, false).is_err());
    }

    #[test]
    fn clips_then_scales() {
        let out = normalize(&grid(vec![-5.0, 0.0, 5.0, 10.0, 15.0]), 0.0, 10.0, false).unwrap();
        assert_eq!(out.as_slice(), &[0.0, 0.0, 50.0, 100.0, 100.0]);
    }

    #[test]
    fn inversion_flips_the_scale() {
        let out = normalize(&grid(vec![0.0, 5.0, 10.0]), 0.0, 10.0, true).unwrap();
        assert_eq!(out.as_slice(), &[100.0, 50.0, 0.0]);
    }

    #[test]
    fn no_data_passes_through() {
        let out = normalize(&grid(vec![-9999.0, 5.0]), 0.0, 10.0, false).unwrap();
        assert_eq!(out.as_slice(), &[-9999.0, 50.0]);
    }

    #[test]
    fn idempotent_on_the_0_100_identity_case() {
        let once = normalize(&grid(vec![0.0, 42.0, 100.0]), 0.0, 100.0, false).unwrap();
        let twice = normalize(&once, 0.0, 100.0, false).unwrap();
        assert_eq!(once.as_slice(), twice.as_slice());
    }
}
