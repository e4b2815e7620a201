//! Dense column-major matrix used for Jacobians and linear subsystems.

use std::fmt;
use std::ops::{Index, IndexMut};

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// Square or rectangular dense matrix with `(row, col)` access.
///
/// Storage is column-major, the layout LAPACK-style kernels and generated
/// model code expect. Indexing goes through nalgebra and is bounds checked.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    data: DMatrix<f64>,
}

impl DenseMatrix {
    /// Create a zero matrix with the given dimensions.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            data: DMatrix::zeros(nrows, ncols),
        }
    }

    /// Create an `n x n` identity matrix.
    pub fn identity(n: usize) -> Self {
        Self {
            data: DMatrix::identity(n, n),
        }
    }

    /// Build a matrix from a column-major slice.
    ///
    /// Element `(r, c)` is read from `values[r + nrows * c]`.
    pub fn from_column_major(nrows: usize, ncols: usize, values: &[f64]) -> Result<Self> {
        if values.len() != nrows * ncols {
            return Err(Error::DimensionMismatch {
                expected: nrows * ncols,
                actual: values.len(),
            });
        }
        Ok(Self {
            data: DMatrix::from_column_slice(nrows, ncols, values),
        })
    }

    /// Build a matrix from row slices. All rows must have the same length.
    pub fn from_rows(rows: &[&[f64]]) -> Result<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, |r| r.len());
        if let Some(bad) = rows.iter().find(|r| r.len() != ncols) {
            return Err(Error::DimensionMismatch {
                expected: ncols,
                actual: bad.len(),
            });
        }
        Ok(Self {
            data: DMatrix::from_fn(nrows, ncols, |r, c| rows[r][c]),
        })
    }

    /// Build a matrix from a function of `(row, col)`.
    pub fn from_fn(nrows: usize, ncols: usize, f: impl FnMut(usize, usize) -> f64) -> Self {
        Self {
            data: DMatrix::from_fn(nrows, ncols, f),
        }
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    /// Whether the matrix is square.
    pub fn is_square(&self) -> bool {
        self.data.is_square()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[(row, col)]
    }

    /// Column-major view of the storage.
    pub fn as_column_major(&self) -> &[f64] {
        self.data.as_slice()
    }

    /// Euclidean norm of column `col`.
    pub fn column_norm(&self, col: usize) -> f64 {
        self.data.column(col).norm()
    }

    /// Largest absolute element, 0 for an empty matrix.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
    }

    /// Compute `A * x`.
    pub fn mul_vec(&self, x: &DVector<f64>) -> Result<DVector<f64>> {
        if x.len() != self.ncols() {
            return Err(Error::DimensionMismatch {
                expected: self.ncols(),
                actual: x.len(),
            });
        }
        Ok(&self.data * x)
    }

    /// Borrow the underlying nalgebra matrix.
    pub fn as_dmatrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Mutably borrow the underlying nalgebra matrix.
    pub fn as_dmatrix_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.data
    }
}

impl From<DMatrix<f64>> for DenseMatrix {
    fn from(data: DMatrix<f64>) -> Self {
        Self { data }
    }
}

impl Index<(usize, usize)> for DenseMatrix {
    type Output = f64;

    fn index(&self, idx: (usize, usize)) -> &f64 {
        &self.data[idx]
    }
}

impl IndexMut<(usize, usize)> for DenseMatrix {
    fn index_mut(&mut self, idx: (usize, usize)) -> &mut f64 {
        &mut self.data[idx]
    }
}

/// Prints `{{a,b},{c,d}}` with three decimals per element.
impl fmt::Display for DenseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{")?;
        for r in 0..self.nrows() {
            for c in 0..self.ncols() {
                write!(f, "{:.3}", self.data[(r, c)])?;
                if c + 1 != self.ncols() {
                    write!(f, ",")?;
                }
            }
            if r + 1 != self.nrows() {
                write!(f, "}},{{")?;
            }
        }
        write!(f, "}}}}")
    }
}

/// Format a vector as `{a,b,c}` with three decimals per element.
pub fn format_vector(v: &[f64]) -> String {
    let items: Vec<String> = v.iter().map(|x| format!("{x:.3}")).collect();
    format!("{{{}}}", items.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_major_layout() {
        // [1 3]
        // [2 4]
        let m = DenseMatrix::from_column_major(2, 2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(m[(0, 0)], 1.0);
        assert_eq!(m[(1, 0)], 2.0);
        assert_eq!(m[(0, 1)], 3.0);
        assert_eq!(m.get(1, 1), 4.0);
        assert_eq!(m.as_column_major(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_from_rows_matches_indexing() {
        let m = DenseMatrix::from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]).unwrap();
        assert_eq!(m[(0, 1)], 2.0);
        assert_eq!(m[(1, 0)], 3.0);
        assert_eq!(m.as_column_major(), &[1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = DenseMatrix::from_rows(&[&[1.0, 2.0], &[3.0]]);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_wrong_slice_length() {
        let result = DenseMatrix::from_column_major(2, 2, &[1.0, 2.0, 3.0]);
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn test_mul_vec() {
        let m = DenseMatrix::from_rows(&[&[2.0, 1.0], &[1.0, 3.0]]).unwrap();
        let y = m.mul_vec(&DVector::from_vec(vec![1.8, 1.4])).unwrap();
        assert!((y[0] - 5.0).abs() < 1e-12);
        assert!((y[1] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_display() {
        let m = DenseMatrix::from_rows(&[&[1.0, 2.0], &[3.0, 4.5]]).unwrap();
        assert_eq!(m.to_string(), "{{1.000,2.000},{3.000,4.500}}");
        assert_eq!(format_vector(&[1.0, -0.25]), "{1.000,-0.250}");
    }

    #[test]
    fn test_column_norm_and_max_abs() {
        let m = DenseMatrix::from_rows(&[&[3.0, 0.0], &[4.0, -7.0]]).unwrap();
        assert_eq!(m.column_norm(0), 5.0);
        assert_eq!(m.max_abs(), 7.0);
    }
}
