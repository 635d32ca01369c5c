//! On-the-fly array derivatives (spec.md §4.3). Today this is just slope
//! from elevation; the module exists so a second derivative (aspect, TRI,
//! …) has an obvious place to land beside it rather than growing inside
//! the pipeline.

use mcda_datatypes::{Grid2D, GridShape2D};
use rayon::prelude::*;

/// Horn's (1981) 3x3 finite-difference slope, in degrees. `pixel_size_m`
/// is `(x, y)` ground size in meters (spec.md §4.3: derived from the
/// `GeoTransform` pixel size and the AOI's mid-latitude via the engine's
/// one equirectangular approximation).
///
/// Edge pixels — those without a full 3x3 window — and any pixel whose
/// window contains a no-data neighbor are marked no-data, per spec.md
/// §4.3's recommended, consistent edge policy.
pub fn slope_degrees(elevation: &Grid2D<f64>, pixel_size_m: (f64, f64)) -> Grid2D<f64> {
    let shape = elevation.shape();
    let no_data = elevation.no_data_value();
    let (dx, dy) = pixel_size_m;
    let mut out = vec![no_data; shape.number_of_elements()];

    out.par_chunks_mut(shape.cols.max(1))
        .enumerate()
        .for_each(|(row, out_row)| {
            for (col, out_px) in out_row.iter_mut().enumerate() {
                *out_px = slope_at(elevation, shape, row, col, dx, dy, no_data);
            }
        });

    Grid2D::from_vec(shape, no_data, out).expect("out is sized to shape.number_of_elements()")
}

#[allow(clippy::too_many_arguments)]
fn slope_at(
    elevation: &Grid2D<f64>,
    shape: GridShape2D,
    row: usize,
    col: usize,
    dx: f64,
    dy: f64,
    no_data: f64,
) -> f64 {
    if row == 0 || col == 0 || row + 1 >= shape.rows || col + 1 >= shape.cols {
        return no_data;
    }

    // a b c
    // d e f
    // g h i
    let a = elevation.get_unchecked(row - 1, col - 1);
    let b = elevation.get_unchecked(row - 1, col);
    let c = elevation.get_unchecked(row - 1, col + 1);
    let d = elevation.get_unchecked(row, col - 1);
    let f = elevation.get_unchecked(row, col + 1);
    let g = elevation.get_unchecked(row + 1, col - 1);
    let h = elevation.get_unchecked(row + 1, col);
    let i = elevation.get_unchecked(row + 1, col + 1);

    for z in [a, b, c, d, f, g, h, i] {
        if z == no_data {
            return no_data;
        }
    }

    let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * dx);
    let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * dy);

    (dz_dx.hypot(dz_dy)).atan().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(shape: GridShape2D, elevation: f64) -> Grid2D<f64> {
        Grid2D::filled(shape, -9999.0, elevation)
    }

    #[test]
    fn flat_surface_has_zero_slope() {
        let dem = flat(GridShape2D::new(5, 5), 100.0);
        let slope = slope_degrees(&dem, (30.0, 30.0));
        assert_eq!(slope.get_unchecked(2, 2), 0.0);
    }

    #[test]
    fn edges_are_no_data() {
        let dem = flat(GridShape2D::new(4, 4), 100.0);
        let slope = slope_degrees(&dem, (30.0, 30.0));
        assert!(slope.is_no_data_at(0, 0));
        assert!(slope.is_no_data_at(0, 3));
        assert!(slope.is_no_data_at(3, 3));
        assert!(!slope.is_no_data_at(1, 1));
    }

    #[test]
    fn no_data_neighbor_propagates() {
        let shape = GridShape2D::new(5, 5);
        let mut dem = flat(shape, 100.0);
        dem.set_unchecked(1, 1, -9999.0);
        let slope = slope_degrees(&dem, (30.0, 30.0));
        // (2, 2)'s 3x3 window includes (1, 1).
        assert!(slope.is_no_data_at(2, 2));
        // (3, 3)'s window does not.
        assert!(!slope.is_no_data_at(3, 3));
    }

    #[test]
    fn a_uniform_ramp_yields_a_constant_nonzero_slope() {
        // z(row, col) = col * 10 meters; a pure east-west ramp.
        let shape = GridShape2D::new(5, 5);
        let mut dem = flat(shape, 0.0);
        for row in 0..shape.rows {
            for col in 0..shape.cols {
                dem.set_unchecked(row, col, col as f64 * 10.0);
            }
        }
        let slope = slope_degrees(&dem, (10.0, 10.0));
        let expected = (1.0_f64).atan().to_degrees(); // rise 10m over run 10m -> 45 degrees
        assert!((slope.get_unchecked(2, 2) - expected).abs() < 1e-9);
        assert!((slope.get_unchecked(2, 3) - expected).abs() < 1e-9);
    }
}
