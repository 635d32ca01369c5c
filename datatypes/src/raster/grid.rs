use super::{GridShape2D, Pixel};
use crate::error::{self, Result};
use serde::{Deserialize, Serialize};
use snafu::ensure;

/// An owned, row-major 2D array with a no-data sentinel value.
///
/// This is the workhorse type every pixel-wise stage (Normalizer,
/// ConstraintCompiler, WeightedOverlay, Statistics, slope derivation)
/// reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid2D<T: Pixel> {
    shape: GridShape2D,
    no_data: T,
    data: Vec<T>,
}

impl<T: Pixel> Grid2D<T> {
    pub fn filled(shape: GridShape2D, no_data: T, fill: T) -> Self {
        Self {
            data: vec![fill; shape.number_of_elements()],
            shape,
            no_data,
        }
    }

    pub fn all_no_data(shape: GridShape2D, no_data: T) -> Self {
        Self::filled(shape, no_data, no_data)
    }

    pub fn from_vec(shape: GridShape2D, no_data: T, data: Vec<T>) -> Result<Self> {
        ensure!(
            data.len() == shape.number_of_elements(),
            error::GridShapeMismatch {
                lhs_rows: shape.rows,
                lhs_cols: shape.cols,
                rhs_rows: data.len(),
                rhs_cols: 1_usize,
            }
        );
        Ok(Self {
            shape,
            no_data,
            data,
        })
    }

    pub fn shape(&self) -> GridShape2D {
        self.shape
    }

    pub fn no_data_value(&self) -> T {
        self.no_data
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        ensure!(
            self.shape.in_bounds(row as isize, col as isize),
            error::GridIndexOutOfBounds {
                row: row as isize,
                col: col as isize,
                rows: self.shape.rows,
                cols: self.shape.cols,
            }
        );
        Ok(self.get_unchecked(row, col))
    }

    pub fn get_unchecked(&self, row: usize, col: usize) -> T {
        self.data[self.shape.linear_index(row, col)]
    }

    pub fn set_unchecked(&mut self, row: usize, col: usize, value: T) {
        let idx = self.shape.linear_index(row, col);
        self.data[idx] = value;
    }

    pub fn is_no_data_at(&self, row: usize, col: usize) -> bool {
        self.get_unchecked(row, col) == self.no_data
    }

    /// Converts every pixel with `map`, leaving no-data pixels untouched
    /// (the sentinel value is passed through `map` unchanged by
    /// re-assigning `no_data` afterwards — callers that need a different
    /// no-data sentinel on the output should build a fresh grid instead).
    pub fn map_valid<F>(&self, mut map: F) -> Grid2D<T>
    where
        F: FnMut(T) -> T,
    {
        let data = self
            .data
            .iter()
            .map(|&v| if v == self.no_data { v } else { map(v) })
            .collect();
        Grid2D {
            shape: self.shape,
            no_data: self.no_data,
            data,
        }
    }

    /// Row-band parallel variant of [`map_valid`], splitting the grid
    /// into `bands` contiguous row ranges processed independently. No
    /// pixel depends on another, so no halo is required (unlike the
    /// slope derivation, which needs a 1-row overlap).
    pub fn map_valid_parallel<F>(&self, map: F) -> Grid2D<T>
    where
        F: Fn(T) -> T + Sync,
        T: Send,
    {
        use rayon::prelude::*;

        let no_data = self.no_data;
        let cols = self.shape.cols;
        let mut out = vec![no_data; self.data.len()];
        out.par_chunks_mut(cols.max(1))
            .zip(self.data.par_chunks(cols.max(1)))
            .for_each(|(out_row, in_row)| {
                for (o, &v) in out_row.iter_mut().zip(in_row.iter()) {
                    *o = if v == no_data { v } else { map(v) };
                }
            });
        Grid2D {
            shape: self.shape,
            no_data,
            data: out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> GridShape2D {
        GridShape2D::new(2, 3)
    }

    #[test]
    fn get_out_of_bounds_errors() {
        let grid = Grid2D::all_no_data(shape(), -9999.0_f64);
        assert!(grid.get(5, 5).is_err());
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        let res = Grid2D::from_vec(shape(), -9999.0_f64, vec![1.0, 2.0]);
        assert!(res.is_err());
    }

    #[test]
    fn map_valid_skips_no_data() {
        let grid =
            Grid2D::from_vec(shape(), -1.0_f64, vec![-1.0, 2.0, 3.0, -1.0, 5.0, 6.0]).unwrap();
        let mapped = grid.map_valid(|v| v * 10.0);
        assert_eq!(mapped.get_unchecked(0, 0), -1.0);
        assert_eq!(mapped.get_unchecked(0, 1), 20.0);
        assert_eq!(mapped.get_unchecked(1, 2), 60.0);
    }

    #[test]
    fn map_valid_parallel_matches_sequential() {
        let grid =
            Grid2D::from_vec(shape(), -1.0_f64, vec![-1.0, 2.0, 3.0, -1.0, 5.0, 6.0]).unwrap();
        let seq = grid.map_valid(|v| v + 1.0);
        let par = grid.map_valid_parallel(|v| v + 1.0);
        assert_eq!(seq.as_slice(), par.as_slice());
    }
}
