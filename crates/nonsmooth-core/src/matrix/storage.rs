//! Structured dense storages: triangular, symmetric and banded.

use nalgebra::DMatrix;

use crate::error::{Error, Result};

/// Which triangle of a triangular matrix carries the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uplo {
    Upper,
    Lower,
}

impl Uplo {
    fn flipped(self) -> Self {
        match self {
            Uplo::Upper => Uplo::Lower,
            Uplo::Lower => Uplo::Upper,
        }
    }
}

/// Square triangular matrix. Entries outside the triangle read as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangularMatrix {
    data: DMatrix<f64>,
    uplo: Uplo,
}

impl TriangularMatrix {
    /// Build from a square dense matrix; entries outside `uplo` are dropped.
    pub fn new(mut data: DMatrix<f64>, uplo: Uplo) -> Result<Self> {
        let n = data.nrows();
        if n != data.ncols() {
            return Err(Error::shape("triangular matrix", (n, n), data.shape()));
        }
        for j in 0..n {
            for i in 0..n {
                if !Self::in_triangle(uplo, i, j) {
                    data[(i, j)] = 0.0;
                }
            }
        }
        Ok(Self { data, uplo })
    }

    pub fn zeros(size: usize, uplo: Uplo) -> Self {
        Self {
            data: DMatrix::zeros(size, size),
            uplo,
        }
    }

    fn in_triangle(uplo: Uplo, row: usize, col: usize) -> bool {
        match uplo {
            Uplo::Upper => row <= col,
            Uplo::Lower => row >= col,
        }
    }

    pub fn uplo(&self) -> Uplo {
        self.uplo
    }

    pub fn size(&self) -> usize {
        self.data.nrows()
    }

    /// Whether `(row, col)` lies in the stored triangle.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        Self::in_triangle(self.uplo, row, col)
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        if self.contains(row, col) {
            self.data[(row, col)]
        } else {
            0.0
        }
    }

    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.data
    }

    pub(crate) fn transpose_in_place(&mut self) {
        self.data.transpose_mut();
        self.uplo = self.uplo.flipped();
    }
}

/// Square symmetric matrix stored in full; writes keep both halves in sync.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricMatrix {
    data: DMatrix<f64>,
}

impl SymmetricMatrix {
    /// Build from the upper triangle of a square dense matrix.
    pub fn from_upper(data: &DMatrix<f64>) -> Result<Self> {
        let n = data.nrows();
        if n != data.ncols() {
            return Err(Error::shape("symmetric matrix", (n, n), data.shape()));
        }
        let full = DMatrix::from_fn(n, n, |i, j| {
            if i <= j { data[(i, j)] } else { data[(j, i)] }
        });
        Ok(Self { data: full })
    }

    pub fn zeros(size: usize) -> Self {
        Self {
            data: DMatrix::zeros(size, size),
        }
    }

    pub fn size(&self) -> usize {
        self.data.nrows()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[(row, col)]
    }

    pub(crate) fn set_pair(&mut self, row: usize, col: usize, value: f64) {
        self.data[(row, col)] = value;
        self.data[(col, row)] = value;
    }

    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.data
    }
}

/// General band matrix in LAPACK band layout.
///
/// Element `(i, j)` with `j - upper <= i <= j + lower` lives at
/// `band[(upper + i - j, j)]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BandedMatrix {
    rows: usize,
    cols: usize,
    lower: usize,
    upper: usize,
    band: DMatrix<f64>,
}

impl BandedMatrix {
    pub fn zeros(rows: usize, cols: usize, lower: usize, upper: usize) -> Self {
        Self {
            rows,
            cols,
            lower,
            upper,
            band: DMatrix::zeros(lower + upper + 1, cols),
        }
    }

    /// Copy the band of a dense matrix; entries outside it are dropped.
    pub fn from_dense(dense: &DMatrix<f64>, lower: usize, upper: usize) -> Self {
        let mut banded = Self::zeros(dense.nrows(), dense.ncols(), lower, upper);
        for j in 0..dense.ncols() {
            for i in banded.row_range(j) {
                banded.band[(upper + i - j, j)] = dense[(i, j)];
            }
        }
        banded
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    pub fn lower_bandwidth(&self) -> usize {
        self.lower
    }

    pub fn upper_bandwidth(&self) -> usize {
        self.upper
    }

    /// Rows of column `col` that fall inside the band.
    pub fn row_range(&self, col: usize) -> std::ops::Range<usize> {
        let start = col.saturating_sub(self.upper);
        let end = (col + self.lower + 1).min(self.rows);
        start..end.max(start)
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        row + self.upper >= col && row <= col + self.lower
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        if self.contains(row, col) {
            self.band[(self.upper + row - col, col)]
        } else {
            0.0
        }
    }

    /// Write inside the band. Returns `false` when `(row, col)` is outside it.
    pub(crate) fn try_set(&mut self, row: usize, col: usize, value: f64) -> bool {
        if self.contains(row, col) {
            self.band[(self.upper + row - col, col)] = value;
            true
        } else {
            false
        }
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.rows, self.cols);
        for j in 0..self.cols {
            for i in self.row_range(j) {
                dense[(i, j)] = self.band[(self.upper + i - j, j)];
            }
        }
        dense
    }

    pub(crate) fn band_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.band
    }

    pub(crate) fn transposed(&self) -> Self {
        let mut t = Self::zeros(self.cols, self.rows, self.upper, self.lower);
        for j in 0..self.cols {
            for i in self.row_range(j) {
                t.try_set(j, i, self.get(i, j));
            }
        }
        t
    }

    /// Resize, optionally keeping the overlapping part of the band.
    pub(crate) fn resized(
        &self,
        rows: usize,
        cols: usize,
        lower: usize,
        upper: usize,
        preserve: bool,
    ) -> Self {
        let mut resized = Self::zeros(rows, cols, lower, upper);
        if preserve {
            for j in 0..self.cols.min(cols) {
                for i in self.row_range(j) {
                    if i < rows {
                        resized.try_set(i, j, self.get(i, j));
                    }
                }
            }
        }
        resized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    #[test]
    fn test_triangular_drops_other_half() {
        let t = TriangularMatrix::new(dmatrix![1.0, 2.0; 3.0, 4.0], Uplo::Upper).unwrap();
        assert_eq!(t.get(0, 1), 2.0);
        assert_eq!(t.get(1, 0), 0.0);
        assert!(!t.contains(1, 0));
    }

    #[test]
    fn test_triangular_transpose_flips_uplo() {
        let mut t = TriangularMatrix::new(dmatrix![1.0, 2.0; 0.0, 4.0], Uplo::Upper).unwrap();
        t.transpose_in_place();
        assert_eq!(t.uplo(), Uplo::Lower);
        assert_eq!(t.get(1, 0), 2.0);
    }

    #[test]
    fn test_symmetric_from_upper() {
        let s = SymmetricMatrix::from_upper(&dmatrix![1.0, 2.0; 99.0, 3.0]).unwrap();
        assert_eq!(s.get(1, 0), 2.0);
        assert_eq!(s.get(0, 1), 2.0);
    }

    #[test]
    fn test_banded_layout() {
        let dense = dmatrix![
            1.0, 2.0, 0.0, 0.0;
            3.0, 4.0, 5.0, 0.0;
            0.0, 6.0, 7.0, 8.0;
            0.0, 0.0, 9.0, 10.0
        ];
        let banded = BandedMatrix::from_dense(&dense, 1, 1);
        assert_eq!(banded.to_dense(), dense);
        assert_eq!(banded.get(0, 3), 0.0);
        assert!(!banded.contains(0, 2));
        assert!(banded.contains(2, 1));
    }

    #[test]
    fn test_banded_transpose() {
        let dense = dmatrix![1.0, 2.0, 0.0; 0.0, 3.0, 4.0; 0.0, 0.0, 5.0];
        let banded = BandedMatrix::from_dense(&dense, 0, 1);
        let t = banded.transposed();
        assert_eq!(t.lower_bandwidth(), 1);
        assert_eq!(t.to_dense(), dense.transpose());
    }
}
