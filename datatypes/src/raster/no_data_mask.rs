use super::GridShape2D;
use crate::error::{self, Result};
use serde::{Deserialize, Serialize};
use snafu::ensure;

/// A boolean raster the same shape as an [`RasterGrid`](super::RasterGrid):
/// `true` means "no-data" (for a source layer's validity mask) or
/// "excluded" (for the constraint compiler's output) — the two uses
/// share this type because both are "pixels this stage will not score".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoDataMask {
    shape: GridShape2D,
    flags: Vec<bool>,
}

impl NoDataMask {
    pub fn new_all_false(shape: GridShape2D) -> Self {
        Self {
            flags: vec![false; shape.number_of_elements()],
            shape,
        }
    }

    pub fn from_vec(shape: GridShape2D, flags: Vec<bool>) -> Result<Self> {
        ensure!(
            flags.len() == shape.number_of_elements(),
            error::GridShapeMismatch {
                lhs_rows: shape.rows,
                lhs_cols: shape.cols,
                rhs_rows: flags.len(),
                rhs_cols: 1_usize,
            }
        );
        Ok(Self { shape, flags })
    }

    pub fn shape(&self) -> GridShape2D {
        self.shape
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.flags[self.shape.linear_index(row, col)]
    }

    pub fn set(&mut self, row: usize, col: usize, value: bool) {
        let idx = self.shape.linear_index(row, col);
        self.flags[idx] = value;
    }

    /// Sets every pixel where `value` is true — used by the constraint
    /// compiler to accumulate `mask |= predicate(layer)` across several
    /// constraint kinds.
    pub fn or_in_place(&mut self, other: &NoDataMask) -> Result<()> {
        ensure!(
            self.shape == other.shape,
            error::GridShapeMismatch {
                lhs_rows: self.shape.rows,
                lhs_cols: self.shape.cols,
                rhs_rows: other.shape.rows,
                rhs_cols: other.shape.cols,
            }
        );
        for (a, &b) in self.flags.iter_mut().zip(other.flags.iter()) {
            *a |= b;
        }
        Ok(())
    }

    pub fn count_true(&self) -> usize {
        self.flags.iter().filter(|&&f| f).count()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_in_place_accumulates() {
        let shape = GridShape2D::new(1, 3);
        let mut a = NoDataMask::from_vec(shape, vec![true, false, false]).unwrap();
        let b = NoDataMask::from_vec(shape, vec![false, true, false]).unwrap();
        a.or_in_place(&b).unwrap();
        assert_eq!(a.as_slice(), &[true, true, false]);
        assert_eq!(a.count_true(), 2);
    }

    #[test]
    fn or_in_place_rejects_shape_mismatch() {
        let mut a = NoDataMask::new_all_false(GridShape2D::new(1, 3));
        let b = NoDataMask::new_all_false(GridShape2D::new(2, 2));
        assert!(a.or_in_place(&b).is_err());
    }
}
