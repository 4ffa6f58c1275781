//! Operator trait for matrix-vector products.
//!
//! Solvers only need `y = alpha * A x + beta * y`; this trait lets them run
//! against any matrix representation that provides it.

use nalgebra::DMatrix;

use crate::error::{Error, Result};
use crate::matrix::{BlockMatrix, NumericMatrix};
use crate::sbm::SparseBlockMatrix;

/// A linear map `A: R^ncols -> R^nrows`.
pub trait LinearOperator {
    fn nrows(&self) -> usize;

    fn ncols(&self) -> usize;

    /// `y = alpha * A x + beta * y`.
    fn apply(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) -> Result<()>;

    /// `y = A x`.
    fn mul_vec(&self, x: &[f64]) -> Result<Vec<f64>> {
        let mut y = vec![0.0; self.nrows()];
        self.apply(1.0, x, 0.0, &mut y)?;
        Ok(y)
    }
}

impl LinearOperator for NumericMatrix {
    fn nrows(&self) -> usize {
        NumericMatrix::nrows(self)
    }

    fn ncols(&self) -> usize {
        NumericMatrix::ncols(self)
    }

    fn apply(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) -> Result<()> {
        self.gemv(alpha, x, beta, y)
    }
}

impl LinearOperator for SparseBlockMatrix {
    fn nrows(&self) -> usize {
        SparseBlockMatrix::nrows(self)
    }

    fn ncols(&self) -> usize {
        SparseBlockMatrix::ncols(self)
    }

    fn apply(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) -> Result<()> {
        self.gemv(alpha, x, beta, y)
    }
}

impl LinearOperator for BlockMatrix {
    fn nrows(&self) -> usize {
        BlockMatrix::nrows(self)
    }

    fn ncols(&self) -> usize {
        BlockMatrix::ncols(self)
    }

    fn apply(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) -> Result<()> {
        self.gemv(alpha, x, beta, y)
    }
}

impl LinearOperator for DMatrix<f64> {
    fn nrows(&self) -> usize {
        self.nrows()
    }

    fn ncols(&self) -> usize {
        self.ncols()
    }

    fn apply(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) -> Result<()> {
        if x.len() != self.ncols() || y.len() != self.nrows() {
            return Err(Error::shape("operator apply", self.shape(), (y.len(), x.len())));
        }
        crate::matrix::scale_vector(y, beta);
        for (j, col) in self.column_iter().enumerate() {
            let xj = alpha * x[j];
            for (yi, aij) in y.iter_mut().zip(col.iter()) {
                *yi += aij * xj;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    /// Simple diagonal operator for testing.
    struct Diag {
        diag: Vec<f64>,
    }

    impl LinearOperator for Diag {
        fn nrows(&self) -> usize {
            self.diag.len()
        }

        fn ncols(&self) -> usize {
            self.diag.len()
        }

        fn apply(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) -> Result<()> {
            for i in 0..self.diag.len() {
                y[i] = alpha * self.diag[i] * x[i] + beta * y[i];
            }
            Ok(())
        }
    }

    #[test]
    fn diagonal_operator() {
        let op = Diag {
            diag: vec![2.0, 3.0, 4.0],
        };
        assert_eq!(op.mul_vec(&[1.0, 1.0, 1.0]).unwrap(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn representations_agree() {
        let dense = dmatrix![1.0, 2.0, 0.0; 0.0, 3.0, 4.0; 5.0, 0.0, 6.0];
        let x = [1.0, -1.0, 2.0];
        let expected = dense.mul_vec(&x).unwrap();

        let numeric = NumericMatrix::dense(dense.clone());
        let sbm = SparseBlockMatrix::from_dense(&dense, &[1, 2], &[1, 2]).unwrap();
        let ops: [&dyn LinearOperator; 2] = [&numeric, &sbm];
        for op in ops {
            assert_eq!(op.mul_vec(&x).unwrap(), expected);
        }
    }
}
