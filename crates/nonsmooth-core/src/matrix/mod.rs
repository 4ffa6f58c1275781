//! Polymorphic numeric matrices.
//!
//! [`NumericMatrix`] wraps one of several storages behind a single API for
//! element access, arithmetic, products and factorized solves. The storage
//! is a closed sum type ([`Storage`]); every operation dispatches with an
//! exhaustive `match`.
//!
//! Each matrix carries a factorization state and a version stamp. Every
//! mutating method resets the factorization and draws a new version, so a
//! stale factorization can never be used to solve against modified data.
//! Solves factorize on demand.
//!
//! Writes that the current storage cannot represent (a nonzero into a zero
//! or identity matrix, outside a triangle or band, or an asymmetric write
//! into a symmetric matrix) promote the storage to dense.

mod block;
mod factor;
mod storage;

pub use block::{BlockMatrix, SharedMatrix};
pub use storage::{BandedMatrix, SymmetricMatrix, TriangularMatrix, Uplo};

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use nalgebra::{DMatrix, DVector, Dyn, linalg::QR};
use nalgebra_sparse::{CooMatrix, CsrMatrix, SparseEntryMut};

use crate::error::{Error, Result};
use crate::sbm::SparseBlockMatrix;
use crate::version::next_version;

/// Storage variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Dense,
    Triangular,
    Symmetric,
    Banded,
    Sparse,
    SparseCoordinate,
    Zero,
    Identity,
    Block,
    SparseBlock,
}

impl StorageKind {
    pub fn name(self) -> &'static str {
        match self {
            StorageKind::Dense => "dense",
            StorageKind::Triangular => "triangular",
            StorageKind::Symmetric => "symmetric",
            StorageKind::Banded => "banded",
            StorageKind::Sparse => "sparse",
            StorageKind::SparseCoordinate => "sparse coordinate",
            StorageKind::Zero => "zero",
            StorageKind::Identity => "identity",
            StorageKind::Block => "block",
            StorageKind::SparseBlock => "sparse block",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Concrete storage of a [`NumericMatrix`].
#[derive(Debug, Clone)]
pub enum Storage {
    Dense(DMatrix<f64>),
    Triangular(TriangularMatrix),
    Symmetric(SymmetricMatrix),
    Banded(BandedMatrix),
    /// Compressed sparse rows.
    Sparse(CsrMatrix<f64>),
    /// Coordinate triplets; repeated positions are summed.
    SparseCoordinate(CooMatrix<f64>),
    Zero { rows: usize, cols: usize },
    Identity { size: usize },
    Block(BlockMatrix),
    SparseBlock(SparseBlockMatrix),
}

impl Storage {
    pub fn kind(&self) -> StorageKind {
        match self {
            Storage::Dense(_) => StorageKind::Dense,
            Storage::Triangular(_) => StorageKind::Triangular,
            Storage::Symmetric(_) => StorageKind::Symmetric,
            Storage::Banded(_) => StorageKind::Banded,
            Storage::Sparse(_) => StorageKind::Sparse,
            Storage::SparseCoordinate(_) => StorageKind::SparseCoordinate,
            Storage::Zero { .. } => StorageKind::Zero,
            Storage::Identity { .. } => StorageKind::Identity,
            Storage::Block(_) => StorageKind::Block,
            Storage::SparseBlock(_) => StorageKind::SparseBlock,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        match self {
            Storage::Dense(d) => d.shape(),
            Storage::Triangular(t) => (t.size(), t.size()),
            Storage::Symmetric(s) => (s.size(), s.size()),
            Storage::Banded(b) => (b.nrows(), b.ncols()),
            Storage::Sparse(csr) => (csr.nrows(), csr.ncols()),
            Storage::SparseCoordinate(coo) => (coo.nrows(), coo.ncols()),
            Storage::Zero { rows, cols } => (*rows, *cols),
            Storage::Identity { size } => (*size, *size),
            Storage::Block(b) => (b.nrows(), b.ncols()),
            Storage::SparseBlock(s) => (s.nrows(), s.ncols()),
        }
    }
}

/// Public view of the factorization a matrix currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorizationState {
    None,
    /// LU factors held beside the untouched storage.
    Lu,
    /// LU factors overwrote the storage.
    LuInPlace,
    /// Cholesky factor overwrote the storage.
    CholeskyInPlace,
    Qr,
    /// The storage holds the inverse.
    InverseInPlace,
}

#[derive(Debug, Clone)]
enum Factorization {
    None,
    /// Factors held beside the storage, valid while the content stamp holds.
    Lu {
        lu: Box<factor::DenseLu>,
        stamp: Vec<u64>,
    },
    /// The storage holds the packed factors.
    LuInPlace(Box<factor::DenseLu>),
    CholeskyInPlace,
    Qr {
        qr: Box<QR<f64, Dyn, Dyn>>,
        stamp: Vec<u64>,
    },
    InverseInPlace,
}

/// `y *= beta`, writing zeros when `beta == 0` so NaNs in `y` do not leak.
pub(crate) fn scale_vector(y: &mut [f64], beta: f64) {
    if beta == 0.0 {
        y.iter_mut().for_each(|v| *v = 0.0);
    } else if beta != 1.0 {
        y.iter_mut().for_each(|v| *v *= beta);
    }
}

fn dense_gemv(alpha: f64, a: &DMatrix<f64>, x: &[f64], beta: f64, y: &mut [f64]) {
    scale_vector(y, beta);
    for (j, col) in a.column_iter().enumerate() {
        let xj = alpha * x[j];
        if xj == 0.0 {
            continue;
        }
        for (yi, aij) in y.iter_mut().zip(col.iter()) {
            *yi += aij * xj;
        }
    }
}

fn dense_triplets(a: &DMatrix<f64>) -> Vec<(usize, usize, f64)> {
    let mut out = Vec::new();
    for (j, col) in a.column_iter().enumerate() {
        for (i, &v) in col.iter().enumerate() {
            if v != 0.0 {
                out.push((i, j, v));
            }
        }
    }
    out
}

/// Matrix of doubles over one of the [`Storage`] variants.
#[derive(Debug, Clone)]
pub struct NumericMatrix {
    storage: Storage,
    factorization: Factorization,
    version: u64,
}

impl From<DMatrix<f64>> for NumericMatrix {
    fn from(dense: DMatrix<f64>) -> Self {
        NumericMatrix::dense(dense)
    }
}

impl NumericMatrix {
    pub fn from_storage(storage: Storage) -> Self {
        Self {
            storage,
            factorization: Factorization::None,
            version: next_version(),
        }
    }

    pub fn dense(dense: DMatrix<f64>) -> Self {
        Self::from_storage(Storage::Dense(dense))
    }

    /// Dense matrix of zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::dense(DMatrix::zeros(rows, cols))
    }

    /// Structural zero matrix; holds no data.
    pub fn zero(rows: usize, cols: usize) -> Self {
        Self::from_storage(Storage::Zero { rows, cols })
    }

    pub fn identity(size: usize) -> Self {
        Self::from_storage(Storage::Identity { size })
    }

    pub fn triangular(matrix: TriangularMatrix) -> Self {
        Self::from_storage(Storage::Triangular(matrix))
    }

    pub fn symmetric(matrix: SymmetricMatrix) -> Self {
        Self::from_storage(Storage::Symmetric(matrix))
    }

    pub fn banded(matrix: BandedMatrix) -> Self {
        Self::from_storage(Storage::Banded(matrix))
    }

    pub fn sparse(matrix: CsrMatrix<f64>) -> Self {
        Self::from_storage(Storage::Sparse(matrix))
    }

    pub fn coordinate(matrix: CooMatrix<f64>) -> Self {
        Self::from_storage(Storage::SparseCoordinate(matrix))
    }

    pub fn block(matrix: BlockMatrix) -> Self {
        Self::from_storage(Storage::Block(matrix))
    }

    pub fn sparse_block(matrix: SparseBlockMatrix) -> Self {
        Self::from_storage(Storage::SparseBlock(matrix))
    }

    /// Dense matrix from column-major values.
    pub fn from_column_major(rows: usize, cols: usize, values: &[f64]) -> Result<Self> {
        if values.len() != rows * cols {
            return Err(Error::shape("column-major data", (rows, cols), (values.len(), 1)));
        }
        Ok(Self::dense(DMatrix::from_column_slice(rows, cols, values)))
    }

    /// Wrap in a shared handle for use as a block.
    pub fn into_shared(self) -> SharedMatrix {
        Rc::new(RefCell::new(self))
    }

    pub fn nrows(&self) -> usize {
        self.shape().0
    }

    pub fn ncols(&self) -> usize {
        self.shape().1
    }

    pub fn shape(&self) -> (usize, usize) {
        self.storage.shape()
    }

    pub fn kind(&self) -> StorageKind {
        self.storage.kind()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Mutable storage access. Counts as a mutation.
    pub fn storage_mut(&mut self) -> &mut Storage {
        self.invalidate();
        &mut self.storage
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Versions of this matrix and, for block composites, of every nested
    /// block. Sparse block storage adds a hash of its contents, since its
    /// blocks can be written through shared handles without a version bump.
    /// Any write anywhere in the composite changes the stamp.
    pub fn content_stamp(&self) -> Vec<u64> {
        match &self.storage {
            Storage::Block(b) => {
                let mut stamp = vec![self.version];
                stamp.extend(b.content_stamp());
                stamp
            }
            Storage::SparseBlock(s) => vec![self.version, s.version(), s.content_hash()],
            _ => vec![self.version],
        }
    }

    pub fn factorization_state(&self) -> FactorizationState {
        match &self.factorization {
            Factorization::None => FactorizationState::None,
            Factorization::Lu { .. } => FactorizationState::Lu,
            Factorization::LuInPlace(_) => FactorizationState::LuInPlace,
            Factorization::CholeskyInPlace => FactorizationState::CholeskyInPlace,
            Factorization::Qr { .. } => FactorizationState::Qr,
            Factorization::InverseInPlace => FactorizationState::InverseInPlace,
        }
    }

    pub fn is_factorized(&self) -> bool {
        !matches!(self.factorization, Factorization::None)
    }

    fn invalidate(&mut self) {
        self.factorization = Factorization::None;
        self.version = next_version();
    }

    fn check_index(&self, row: usize, col: usize) -> Result<()> {
        let (rows, cols) = self.shape();
        if row >= rows || col >= cols {
            return Err(Error::IndexOutOfRange { row, col, rows, cols });
        }
        Ok(())
    }

    fn check_square(&self, context: &'static str) -> Result<usize> {
        let (rows, cols) = self.shape();
        if rows != cols {
            return Err(Error::shape(context, (rows, rows), (rows, cols)));
        }
        Ok(rows)
    }

    fn promote_to_dense(&mut self) {
        if self.kind() != StorageKind::Dense {
            log::debug!("promoting {} matrix to dense storage", self.kind());
            self.storage = Storage::Dense(self.to_dense());
        }
    }

    /// Move the contents out as a dense matrix, leaving a placeholder.
    fn take_dense(&mut self) -> DMatrix<f64> {
        match &mut self.storage {
            Storage::Dense(d) => std::mem::replace(d, DMatrix::zeros(0, 0)),
            _ => self.to_dense(),
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.check_index(row, col)?;
        Ok(match &self.storage {
            Storage::Dense(d) => d[(row, col)],
            Storage::Triangular(t) => t.get(row, col),
            Storage::Symmetric(s) => s.get(row, col),
            Storage::Banded(b) => b.get(row, col),
            Storage::Sparse(csr) => csr
                .get_entry(row, col)
                .map_or(0.0, |entry| entry.into_value()),
            Storage::SparseCoordinate(coo) => coo
                .triplet_iter()
                .filter(|&(i, j, _)| i == row && j == col)
                .map(|(_, _, v)| *v)
                .sum(),
            Storage::Zero { .. } => 0.0,
            Storage::Identity { .. } => {
                if row == col {
                    1.0
                } else {
                    0.0
                }
            }
            Storage::Block(b) => b.get(row, col)?,
            Storage::SparseBlock(s) => s.get_value(row, col)?,
        })
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.check_index(row, col)?;
        let current = self.get(row, col)?;
        self.invalidate();
        let stored = match &mut self.storage {
            Storage::Dense(d) => {
                d[(row, col)] = value;
                true
            }
            Storage::Triangular(t) => {
                if t.contains(row, col) {
                    t.data_mut()[(row, col)] = value;
                    true
                } else {
                    value == 0.0
                }
            }
            Storage::Symmetric(s) => {
                if row == col || s.get(col, row) == value {
                    s.set_pair(row, col, value);
                    true
                } else {
                    false
                }
            }
            Storage::Banded(b) => b.try_set(row, col, value) || value == 0.0,
            Storage::Sparse(csr) => {
                let updated = if let Some(SparseEntryMut::NonZero(v)) = csr.get_entry_mut(row, col) {
                    *v = value;
                    true
                } else {
                    false
                };
                if !updated && value != 0.0 {
                    let mut coo = CooMatrix::from(&*csr);
                    coo.push(row, col, value);
                    *csr = CsrMatrix::from(&coo);
                }
                true
            }
            Storage::SparseCoordinate(coo) => {
                if current != value {
                    coo.push(row, col, value - current);
                }
                true
            }
            Storage::Zero { .. } => value == 0.0,
            Storage::Identity { .. } => value == if row == col { 1.0 } else { 0.0 },
            Storage::Block(b) => {
                b.set(row, col, value)?;
                true
            }
            Storage::SparseBlock(s) => {
                s.entry(row, col, value)?;
                true
            }
        };
        if !stored {
            self.promote_to_dense();
            if let Storage::Dense(d) = &mut self.storage {
                d[(row, col)] = value;
            }
        }
        Ok(())
    }

    /// `A[row, col] += value`.
    pub fn add_at(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.check_index(row, col)?;
        match &mut self.storage {
            Storage::SparseCoordinate(coo) => coo.push(row, col, value),
            Storage::Block(b) => b.add_at(row, col, value)?,
            Storage::SparseBlock(s) => s.add_value(row, col, value)?,
            _ => {
                let current = self.get(row, col)?;
                return self.set(row, col, current + value);
            }
        }
        self.invalidate();
        Ok(())
    }

    /// Set every entry to `value`. Non-dense storages become dense.
    pub fn fill(&mut self, value: f64) {
        self.invalidate();
        let (rows, cols) = self.shape();
        match &mut self.storage {
            Storage::Dense(d) => d.fill(value),
            Storage::Zero { .. } if value == 0.0 => {}
            _ => self.storage = Storage::Dense(DMatrix::from_element(rows, cols, value)),
        }
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        match &self.storage {
            Storage::Dense(d) => d.clone(),
            Storage::Triangular(t) => t.data().clone(),
            Storage::Symmetric(s) => s.data().clone(),
            Storage::Banded(b) => b.to_dense(),
            Storage::Sparse(csr) => DMatrix::from(csr),
            Storage::SparseCoordinate(coo) => DMatrix::from(coo),
            Storage::Zero { rows, cols } => DMatrix::zeros(*rows, *cols),
            Storage::Identity { size } => DMatrix::identity(*size, *size),
            Storage::Block(b) => b.to_dense(),
            Storage::SparseBlock(s) => s.to_dense(),
        }
    }

    /// Nonzero entries as `(row, col, value)`. Coordinate storage may repeat
    /// a position; the matrix entry is the sum of its repeats.
    pub fn triplets(&self) -> Vec<(usize, usize, f64)> {
        match &self.storage {
            Storage::Dense(d) => dense_triplets(d),
            Storage::Triangular(t) => dense_triplets(t.data()),
            Storage::Symmetric(s) => dense_triplets(s.data()),
            Storage::Banded(b) => {
                let mut out = Vec::new();
                for j in 0..b.ncols() {
                    for i in b.row_range(j) {
                        let v = b.get(i, j);
                        if v != 0.0 {
                            out.push((i, j, v));
                        }
                    }
                }
                out
            }
            Storage::Sparse(csr) => csr
                .triplet_iter()
                .filter(|(_, _, v)| **v != 0.0)
                .map(|(i, j, v)| (i, j, *v))
                .collect(),
            Storage::SparseCoordinate(coo) => coo
                .triplet_iter()
                .filter(|(_, _, v)| **v != 0.0)
                .map(|(i, j, v)| (i, j, *v))
                .collect(),
            Storage::Zero { .. } => Vec::new(),
            Storage::Identity { size } => (0..*size).map(|i| (i, i, 1.0)).collect(),
            Storage::Block(b) => b.triplets(),
            Storage::SparseBlock(s) => s.triplets(),
        }
    }

    /// `y = alpha * A x + beta * y`.
    pub fn gemv(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) -> Result<()> {
        let (rows, cols) = self.shape();
        if x.len() != cols || y.len() != rows {
            return Err(Error::shape("gemv", (rows, cols), (y.len(), x.len())));
        }
        match &self.storage {
            Storage::Dense(d) => dense_gemv(alpha, d, x, beta, y),
            Storage::Triangular(t) => dense_gemv(alpha, t.data(), x, beta, y),
            Storage::Symmetric(s) => dense_gemv(alpha, s.data(), x, beta, y),
            Storage::Banded(b) => {
                scale_vector(y, beta);
                for (j, &xj) in x.iter().enumerate() {
                    let xj = alpha * xj;
                    for i in b.row_range(j) {
                        y[i] += b.get(i, j) * xj;
                    }
                }
            }
            Storage::Sparse(csr) => {
                for (i, row) in csr.row_iter().enumerate() {
                    let dot: f64 = row
                        .col_indices()
                        .iter()
                        .zip(row.values())
                        .map(|(&j, &v)| v * x[j])
                        .sum();
                    y[i] = alpha * dot + if beta == 0.0 { 0.0 } else { beta * y[i] };
                }
            }
            Storage::SparseCoordinate(coo) => {
                scale_vector(y, beta);
                for (i, j, v) in coo.triplet_iter() {
                    y[i] += alpha * v * x[j];
                }
            }
            Storage::Zero { .. } => scale_vector(y, beta),
            Storage::Identity { .. } => {
                scale_vector(y, beta);
                for (yi, xi) in y.iter_mut().zip(x) {
                    *yi += alpha * xi;
                }
            }
            Storage::Block(b) => b.gemv(alpha, x, beta, y)?,
            Storage::SparseBlock(s) => s.gemv(alpha, x, beta, y)?,
        }
        Ok(())
    }

    /// Dot product of row `row` with `x`.
    pub fn row_dot(&self, row: usize, x: &[f64]) -> Result<f64> {
        let (rows, cols) = self.shape();
        if row >= rows {
            return Err(Error::IndexOutOfRange { row, col: 0, rows, cols });
        }
        if x.len() != cols {
            return Err(Error::shape("row dot product", (1, cols), (1, x.len())));
        }
        Ok(match &self.storage {
            Storage::Dense(d) => d.row(row).iter().zip(x).map(|(a, b)| a * b).sum(),
            Storage::Sparse(csr) => {
                let r = csr.row(row);
                r.col_indices()
                    .iter()
                    .zip(r.values())
                    .map(|(&j, &v)| v * x[j])
                    .sum()
            }
            Storage::Zero { .. } => 0.0,
            Storage::Identity { .. } => x[row],
            Storage::Block(b) => b.row_dot(row, x)?,
            Storage::SparseBlock(s) => s.row_dot(row, x)?,
            _ => {
                let mut sum = 0.0;
                for (j, xj) in x.iter().enumerate() {
                    sum += self.get(row, j)? * xj;
                }
                sum
            }
        })
    }

    /// Maximum absolute row sum.
    pub fn norm_inf(&self) -> f64 {
        match &self.storage {
            Storage::Zero { .. } => 0.0,
            Storage::Identity { size } => {
                if *size > 0 {
                    1.0
                } else {
                    0.0
                }
            }
            Storage::Sparse(csr) => csr
                .row_iter()
                .map(|row| row.values().iter().map(|v| v.abs()).sum::<f64>())
                .fold(0.0, f64::max),
            Storage::SparseBlock(s) => s.norm_inf(),
            _ => self
                .to_dense()
                .row_iter()
                .map(|row| row.iter().map(|v| v.abs()).sum::<f64>())
                .fold(0.0, f64::max),
        }
    }

    /// Largest absolute value of each column.
    pub fn norm_inf_by_column(&self) -> Vec<f64> {
        let cols = self.ncols();
        match &self.storage {
            Storage::Zero { .. } => vec![0.0; cols],
            Storage::Identity { .. } => vec![1.0; cols],
            Storage::Sparse(csr) => {
                let mut norms = vec![0.0_f64; cols];
                for (_, j, v) in csr.triplet_iter() {
                    norms[j] = norms[j].max(v.abs());
                }
                norms
            }
            Storage::SparseBlock(s) => s.norm_inf_by_column(),
            _ => self
                .to_dense()
                .column_iter()
                .map(|col| col.iter().fold(0.0_f64, |acc, v| acc.max(v.abs())))
                .collect(),
        }
    }

    /// `self += alpha * other`.
    ///
    /// Block composites keep their grid: with an identical grid the update
    /// runs block by block through the shared handles, otherwise the entries
    /// of `other` are scattered into the owning blocks.
    pub fn add_scaled(&mut self, alpha: f64, other: &NumericMatrix) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::shape("matrix addition", self.shape(), other.shape()));
        }
        self.invalidate();

        enum Next {
            Done,
            CopyOther,
            Densify,
        }

        let next = match (&mut self.storage, &other.storage) {
            (_, Storage::Zero { .. }) => Next::Done,
            (Storage::Zero { .. }, _) => Next::CopyOther,
            (Storage::Dense(a), Storage::Dense(b)) => {
                *a += b * alpha;
                Next::Done
            }
            (Storage::Dense(a), _) => {
                for (i, j, v) in other.triplets() {
                    a[(i, j)] += alpha * v;
                }
                Next::Done
            }
            (Storage::Symmetric(a), Storage::Symmetric(b)) => {
                *a.data_mut() += b.data() * alpha;
                Next::Done
            }
            (Storage::Triangular(a), Storage::Triangular(b)) if a.uplo() == b.uplo() => {
                *a.data_mut() += b.data() * alpha;
                Next::Done
            }
            (Storage::Sparse(a), Storage::Sparse(b)) => {
                let mut scaled = b.clone();
                scaled.values_mut().iter_mut().for_each(|v| *v *= alpha);
                *a = &*a + &scaled;
                Next::Done
            }
            (Storage::Sparse(a), _) => {
                let mut coo = CooMatrix::from(&*a);
                for (i, j, v) in other.triplets() {
                    coo.push(i, j, alpha * v);
                }
                *a = CsrMatrix::from(&coo);
                Next::Done
            }
            (Storage::SparseCoordinate(a), _) => {
                for (i, j, v) in other.triplets() {
                    a.push(i, j, alpha * v);
                }
                Next::Done
            }
            (Storage::Block(a), Storage::Block(b)) if a.same_grid(b) => {
                for ((r, c), rhs) in b.blocks() {
                    let rhs = rhs.borrow().clone();
                    if let Some(lhs) = a.block(r, c).cloned() {
                        lhs.borrow_mut().add_scaled(alpha, &rhs)?;
                    } else {
                        let mut fresh = rhs;
                        fresh.scale(alpha);
                        a.set_block(r, c, fresh.into_shared())?;
                    }
                }
                Next::Done
            }
            (Storage::Block(a), _) => {
                for (i, j, v) in other.triplets() {
                    a.add_at(i, j, alpha * v)?;
                }
                Next::Done
            }
            (Storage::SparseBlock(a), Storage::SparseBlock(b))
                if a.row_offsets() == b.row_offsets() && a.col_offsets() == b.col_offsets() =>
            {
                *a = SparseBlockMatrix::add(a, b, 1.0, alpha)?;
                Next::Done
            }
            (Storage::SparseBlock(a), _) => {
                for (i, j, v) in other.triplets() {
                    a.add_value(i, j, alpha * v)?;
                }
                Next::Done
            }
            _ => Next::Densify,
        };

        match next {
            Next::Done => {}
            Next::CopyOther => {
                self.storage = other.storage.clone();
                self.scale(alpha);
            }
            Next::Densify => {
                self.promote_to_dense();
                if let Storage::Dense(a) = &mut self.storage {
                    for (i, j, v) in other.triplets() {
                        a[(i, j)] += alpha * v;
                    }
                }
            }
        }
        self.version = next_version();
        Ok(())
    }

    /// `self += other`.
    pub fn add_assign(&mut self, other: &NumericMatrix) -> Result<()> {
        self.add_scaled(1.0, other)
    }

    /// `self -= other`.
    pub fn sub_assign(&mut self, other: &NumericMatrix) -> Result<()> {
        self.add_scaled(-1.0, other)
    }

    /// Replace the contents with a deep copy of `other`.
    pub fn assign(&mut self, other: &NumericMatrix) {
        self.storage = other.storage.clone();
        self.invalidate();
    }

    /// Multiply every entry by `alpha`. Block composites scale their blocks
    /// in place, which is visible through every alias.
    pub fn scale(&mut self, alpha: f64) {
        self.invalidate();
        let mut replacement = None;
        match &mut self.storage {
            Storage::Dense(d) => *d *= alpha,
            Storage::Triangular(t) => *t.data_mut() *= alpha,
            Storage::Symmetric(s) => *s.data_mut() *= alpha,
            Storage::Banded(b) => *b.band_mut() *= alpha,
            Storage::Sparse(csr) => csr.values_mut().iter_mut().for_each(|v| *v *= alpha),
            Storage::SparseCoordinate(coo) => {
                let mut scaled = CooMatrix::new(coo.nrows(), coo.ncols());
                for (i, j, v) in coo.triplet_iter() {
                    scaled.push(i, j, alpha * v);
                }
                *coo = scaled;
            }
            Storage::Zero { .. } => {}
            Storage::Identity { size } => {
                if alpha != 1.0 {
                    replacement = Some(Storage::Dense(DMatrix::identity(*size, *size) * alpha));
                }
            }
            Storage::Block(b) => {
                for block in b.unique_blocks() {
                    block.borrow_mut().scale(alpha);
                }
            }
            Storage::SparseBlock(s) => s.scale(alpha),
        }
        if let Some(storage) = replacement {
            self.storage = storage;
        }
    }

    /// Transpose. Block composites get a fresh copy of every block.
    pub fn transpose_in_place(&mut self) {
        self.invalidate();
        match &mut self.storage {
            Storage::Dense(d) => *d = d.transpose(),
            Storage::Triangular(t) => t.transpose_in_place(),
            Storage::Symmetric(_) | Storage::Identity { .. } => {}
            Storage::Banded(b) => *b = b.transposed(),
            Storage::Sparse(csr) => *csr = csr.transpose(),
            Storage::SparseCoordinate(coo) => {
                let mut t = CooMatrix::new(coo.ncols(), coo.nrows());
                for (i, j, v) in coo.triplet_iter() {
                    t.push(j, i, *v);
                }
                *coo = t;
            }
            Storage::Zero { rows, cols } => std::mem::swap(rows, cols),
            Storage::Block(b) => *b = b.transposed(),
            Storage::SparseBlock(s) => *s = s.transpose(),
        }
    }

    /// Change the shape.
    ///
    /// With `preserve` the overlapping entries are kept, otherwise the
    /// contents are zeroed. Block composites cannot be reshaped here: their
    /// offsets are re-derived from the current blocks and the requested
    /// shape must match the result.
    pub fn resize(&mut self, rows: usize, cols: usize, preserve: bool) -> Result<()> {
        self.invalidate();
        let mut densify = false;
        match &mut self.storage {
            Storage::Dense(d) => {
                if preserve {
                    d.resize_mut(rows, cols, 0.0);
                } else {
                    *d = DMatrix::zeros(rows, cols);
                }
            }
            Storage::Triangular(t) if rows == cols => {
                if preserve {
                    t.data_mut().resize_mut(rows, cols, 0.0);
                } else {
                    *t = TriangularMatrix::zeros(rows, t.uplo());
                }
            }
            Storage::Symmetric(s) if rows == cols => {
                if preserve {
                    s.data_mut().resize_mut(rows, cols, 0.0);
                } else {
                    *s = SymmetricMatrix::zeros(rows);
                }
            }
            Storage::Banded(b) => {
                *b = b.resized(rows, cols, b.lower_bandwidth(), b.upper_bandwidth(), preserve);
            }
            Storage::Sparse(csr) => {
                let mut coo = CooMatrix::new(rows, cols);
                if preserve {
                    for (i, j, v) in csr.triplet_iter() {
                        if i < rows && j < cols {
                            coo.push(i, j, *v);
                        }
                    }
                }
                *csr = CsrMatrix::from(&coo);
            }
            Storage::SparseCoordinate(coo) => {
                let mut resized = CooMatrix::new(rows, cols);
                if preserve {
                    for (i, j, v) in coo.triplet_iter() {
                        if i < rows && j < cols {
                            resized.push(i, j, *v);
                        }
                    }
                }
                *coo = resized;
            }
            Storage::Zero { rows: r, cols: c } => {
                *r = rows;
                *c = cols;
            }
            Storage::Identity { size } if rows == cols && preserve => *size = rows,
            Storage::Block(b) => {
                b.rederive_offsets()?;
                if (b.nrows(), b.ncols()) != (rows, cols) {
                    return Err(Error::shape("block resize", (b.nrows(), b.ncols()), (rows, cols)));
                }
            }
            Storage::SparseBlock(s) => {
                if (s.nrows(), s.ncols()) != (rows, cols) {
                    return Err(Error::shape("sparse block resize", (s.nrows(), s.ncols()), (rows, cols)));
                }
            }
            _ => densify = true,
        }
        if densify {
            let mut dense = if preserve {
                self.to_dense()
            } else {
                DMatrix::zeros(0, 0)
            };
            dense.resize_mut(rows, cols, 0.0);
            self.storage = Storage::Dense(dense);
        }
        Ok(())
    }

    /// Resize into banded storage with the given bandwidths.
    pub fn resize_banded(&mut self, rows: usize, cols: usize, lower: usize, upper: usize, preserve: bool) {
        self.invalidate();
        let banded = match &self.storage {
            Storage::Banded(b) => b.resized(rows, cols, lower, upper, preserve),
            _ if preserve => {
                let mut dense = self.to_dense();
                dense.resize_mut(rows, cols, 0.0);
                BandedMatrix::from_dense(&dense, lower, upper)
            }
            _ => BandedMatrix::zeros(rows, cols, lower, upper),
        };
        self.storage = Storage::Banded(banded);
    }

    /// LU factorization kept beside the storage, which stays untouched.
    pub fn factorize(&mut self) -> Result<()> {
        self.check_square("LU factorization")?;
        self.factorization = Factorization::None;
        let lu = factor::lu(self.to_dense())?;
        log::trace!("LU factorization of {}x{} {} matrix", self.nrows(), self.ncols(), self.kind());
        self.factorization = Factorization::Lu {
            lu: Box::new(lu),
            stamp: self.content_stamp(),
        };
        Ok(())
    }

    /// LU factorization overwriting the storage.
    ///
    /// Dense-like storages are promoted to dense and overwritten by the
    /// packed factors; afterwards [`get`](Self::get) reads the factors.
    /// Sparse and block storages keep their data and hold separate factors.
    pub fn factorize_in_place(&mut self) -> Result<()> {
        self.check_square("LU factorization")?;
        match self.kind() {
            StorageKind::Dense | StorageKind::Triangular | StorageKind::Symmetric | StorageKind::Banded => {
                self.factorization = Factorization::None;
                let dense = self.take_dense();
                let result = factor::lu(dense.clone());
                self.version = next_version();
                match result {
                    Ok(lu) => {
                        self.storage = Storage::Dense(factor::packed(&lu));
                        self.factorization = Factorization::LuInPlace(Box::new(lu));
                        Ok(())
                    }
                    Err(e) => {
                        self.storage = Storage::Dense(dense);
                        Err(e)
                    }
                }
            }
            _ => self.factorize(),
        }
    }

    /// Cholesky factorization overwriting the storage with `L`.
    pub fn factorize_cholesky_in_place(&mut self) -> Result<()> {
        self.check_square("Cholesky factorization")?;
        match self.kind() {
            StorageKind::Dense
            | StorageKind::Triangular
            | StorageKind::Symmetric
            | StorageKind::Banded
            | StorageKind::Identity => {
                self.factorization = Factorization::None;
                let dense = self.take_dense();
                let result = factor::cholesky(&dense);
                self.version = next_version();
                match result {
                    Ok(l) => {
                        self.storage = Storage::Dense(l);
                        self.factorization = Factorization::CholeskyInPlace;
                        Ok(())
                    }
                    Err(e) => {
                        self.storage = Storage::Dense(dense);
                        Err(e)
                    }
                }
            }
            kind => Err(Error::Unsupported {
                operation: "in-place Cholesky factorization",
                kind: kind.name(),
            }),
        }
    }

    /// QR factorization of a square or tall matrix.
    pub fn factorize_qr(&mut self) -> Result<()> {
        let (rows, cols) = self.shape();
        if rows < cols {
            return Err(Error::shape("QR factorization", (cols, cols), (rows, cols)));
        }
        self.factorization = Factorization::Qr {
            qr: Box::new(self.to_dense().qr()),
            stamp: self.content_stamp(),
        };
        Ok(())
    }

    /// Replace the contents by the inverse.
    ///
    /// Storages other than identity become dense.
    pub fn invert_in_place(&mut self) -> Result<()> {
        self.check_square("matrix inversion")?;
        if self.kind() == StorageKind::Identity {
            self.invalidate();
            self.factorization = Factorization::InverseInPlace;
            return Ok(());
        }
        self.factorization = Factorization::None;
        let dense = self.take_dense();
        let result = factor::inverse(dense.clone());
        self.version = next_version();
        match result {
            Ok(inverse) => {
                self.storage = Storage::Dense(inverse);
                self.factorization = Factorization::InverseInPlace;
                Ok(())
            }
            Err(e) => {
                self.storage = Storage::Dense(dense);
                Err(e)
            }
        }
    }

    fn needs_factorization(&self) -> bool {
        match &self.factorization {
            Factorization::None => true,
            Factorization::Lu { stamp, .. } | Factorization::Qr { stamp, .. } => *stamp != self.content_stamp(),
            _ => false,
        }
    }

    /// Solve `A x = b`, overwriting `b` with `x`.
    ///
    /// Factorizes first when no valid factorization is held.
    pub fn solve_in_place(&mut self, b: &mut [f64]) -> Result<()> {
        let n = self.check_square("linear solve")?;
        if b.len() != n {
            return Err(Error::shape("linear solve right-hand side", (n, 1), (b.len(), 1)));
        }
        if let Storage::Identity { .. } = self.storage {
            return Ok(());
        }
        if let (Storage::Triangular(t), Factorization::None) = (&self.storage, &self.factorization) {
            return match t.uplo() {
                Uplo::Upper => factor::upper_solve(t.data(), b),
                Uplo::Lower => factor::lower_solve(t.data(), b),
            };
        }
        if self.needs_factorization() {
            log::debug!("factorizing {}x{} {} matrix before solve", n, n, self.kind());
            self.factorize()?;
        }
        match (&self.factorization, &self.storage) {
            (Factorization::Lu { lu, .. }, _) | (Factorization::LuInPlace(lu), _) => factor::lu_solve(lu, b)?,
            (Factorization::CholeskyInPlace, Storage::Dense(l)) => factor::cholesky_solve(l, b)?,
            (Factorization::Qr { qr, .. }, _) => {
                let x = qr_least_squares(qr, b)?;
                b.copy_from_slice(&x);
            }
            (Factorization::InverseInPlace, _) => {
                let rhs = b.to_vec();
                self.gemv(1.0, &rhs, 0.0, b)?;
            }
            _ => {
                return Err(Error::Unsupported {
                    operation: "solve with the held factorization",
                    kind: self.kind().name(),
                });
            }
        }
        Ok(())
    }

    /// Solve `A X = B` column by column, overwriting `B`.
    pub fn solve_matrix_in_place(&mut self, b: &mut DMatrix<f64>) -> Result<()> {
        let n = self.nrows();
        if b.nrows() != n {
            return Err(Error::shape("linear solve right-hand side", (n, b.ncols()), b.shape()));
        }
        let mut column = vec![0.0; n];
        for j in 0..b.ncols() {
            for (dst, src) in column.iter_mut().zip(b.column(j).iter()) {
                *dst = *src;
            }
            self.solve_in_place(&mut column)?;
            b.column_mut(j).copy_from_slice(&column);
        }
        Ok(())
    }

    /// Least-squares solution of `A x ≈ b` for a square or tall matrix,
    /// through the QR factorization.
    pub fn solve_least_squares(&mut self, b: &[f64]) -> Result<Vec<f64>> {
        let rows = self.nrows();
        if b.len() != rows {
            return Err(Error::shape("least-squares right-hand side", (rows, 1), (b.len(), 1)));
        }
        if !matches!(self.factorization, Factorization::Qr { .. }) || self.needs_factorization() {
            self.factorize_qr()?;
        }
        match &self.factorization {
            Factorization::Qr { qr, .. } => qr_least_squares(qr, b),
            _ => Err(Error::Unsupported {
                operation: "least-squares solve",
                kind: self.kind().name(),
            }),
        }
    }
}

fn qr_least_squares(qr: &QR<f64, Dyn, Dyn>, b: &[f64]) -> Result<Vec<f64>> {
    let mut rhs = DVector::from_column_slice(b);
    qr.q_tr_mul(&mut rhs);
    let r = qr.r();
    let mut x = rhs.as_slice()[..r.ncols()].to_vec();
    factor::upper_solve(&r, &mut x)?;
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    fn residual(a: &DMatrix<f64>, x: &[f64], b: &[f64]) -> f64 {
        let ax = a * DVector::from_column_slice(x);
        (ax - DVector::from_column_slice(b)).norm() / DVector::from_column_slice(b).norm()
    }

    #[test]
    fn test_dense_get_set() {
        let mut m = NumericMatrix::zeros(2, 3);
        m.set(1, 2, 4.5).unwrap();
        assert_eq!(m.get(1, 2).unwrap(), 4.5);
        assert!(matches!(m.get(2, 0), Err(Error::IndexOutOfRange { .. })));
        assert!(matches!(m.set(0, 3, 1.0), Err(Error::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_zero_promotes_on_write() {
        let mut m = NumericMatrix::zero(2, 2);
        m.set(0, 0, 0.0).unwrap();
        assert_eq!(m.kind(), StorageKind::Zero);
        m.set(0, 1, 3.0).unwrap();
        assert_eq!(m.kind(), StorageKind::Dense);
        assert_eq!(m.get(0, 1).unwrap(), 3.0);
    }

    #[test]
    fn test_identity_promotes_on_write() {
        let mut m = NumericMatrix::identity(3);
        m.set(1, 1, 1.0).unwrap();
        assert_eq!(m.kind(), StorageKind::Identity);
        m.set(1, 0, 2.0).unwrap();
        assert_eq!(m.kind(), StorageKind::Dense);
        assert_eq!(m.to_dense(), dmatrix![1.0, 0.0, 0.0; 2.0, 1.0, 0.0; 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_triangular_off_triangle_write_promotes() {
        let t = TriangularMatrix::new(dmatrix![1.0, 2.0; 0.0, 3.0], Uplo::Upper).unwrap();
        let mut m = NumericMatrix::triangular(t);
        m.set(0, 1, 5.0).unwrap();
        assert_eq!(m.kind(), StorageKind::Triangular);
        m.set(1, 0, 4.0).unwrap();
        assert_eq!(m.kind(), StorageKind::Dense);
        assert_eq!(m.to_dense(), dmatrix![1.0, 5.0; 4.0, 3.0]);
    }

    #[test]
    fn test_symmetric_asymmetric_write_promotes() {
        let s = SymmetricMatrix::from_upper(&dmatrix![2.0, 1.0; 1.0, 2.0]).unwrap();
        let mut m = NumericMatrix::symmetric(s);
        m.set(1, 1, 5.0).unwrap();
        m.set(0, 1, 1.0).unwrap();
        assert_eq!(m.kind(), StorageKind::Symmetric);
        m.set(0, 1, 7.0).unwrap();
        assert_eq!(m.kind(), StorageKind::Dense);
        assert_eq!(m.get(1, 0).unwrap(), 1.0);
    }

    #[test]
    fn test_banded_write_outside_band_promotes() {
        let mut m = NumericMatrix::banded(BandedMatrix::zeros(3, 3, 1, 0));
        m.set(1, 0, 2.0).unwrap();
        assert_eq!(m.kind(), StorageKind::Banded);
        m.set(0, 2, 1.0).unwrap();
        assert_eq!(m.kind(), StorageKind::Dense);
        assert_eq!(m.get(1, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_sparse_set_inserts() {
        let mut coo = CooMatrix::new(3, 3);
        coo.push(0, 0, 1.0);
        let mut m = NumericMatrix::sparse(CsrMatrix::from(&coo));
        m.set(0, 0, 2.0).unwrap();
        m.set(2, 1, 3.0).unwrap();
        assert_eq!(m.kind(), StorageKind::Sparse);
        assert_eq!(m.get(0, 0).unwrap(), 2.0);
        assert_eq!(m.get(2, 1).unwrap(), 3.0);
        assert_eq!(m.get(1, 1).unwrap(), 0.0);
    }

    #[test]
    fn test_coordinate_set_and_add() {
        let mut m = NumericMatrix::coordinate(CooMatrix::new(2, 2));
        m.add_at(0, 1, 1.5).unwrap();
        m.add_at(0, 1, 1.5).unwrap();
        assert_eq!(m.get(0, 1).unwrap(), 3.0);
        m.set(0, 1, -1.0).unwrap();
        assert_eq!(m.get(0, 1).unwrap(), -1.0);
        assert_eq!(m.to_dense(), dmatrix![0.0, -1.0; 0.0, 0.0]);
    }

    #[test]
    fn test_mutation_resets_factorization_and_bumps_version() {
        let mut m = NumericMatrix::dense(dmatrix![4.0, 1.0; 1.0, 3.0]);
        m.factorize().unwrap();
        assert_eq!(m.factorization_state(), FactorizationState::Lu);
        let v = m.version();
        m.scale(2.0);
        assert_eq!(m.factorization_state(), FactorizationState::None);
        assert!(m.version() > v);
    }

    #[test]
    fn test_solve_refactorizes_after_mutation() {
        let mut m = NumericMatrix::dense(dmatrix![4.0, 1.0; 1.0, 3.0]);
        let mut b = [1.0, 2.0];
        m.solve_in_place(&mut b).unwrap();
        m.set(0, 0, 10.0).unwrap();
        let mut b2 = [1.0, 2.0];
        m.solve_in_place(&mut b2).unwrap();
        assert!(residual(&dmatrix![10.0, 1.0; 1.0, 3.0], &b2, &[1.0, 2.0]) < 1e-12);
    }

    #[test]
    fn test_solve_in_place_variants() {
        let a = dmatrix![4.0, 2.0, 0.0; 2.0, 5.0, 1.0; 0.0, 1.0, 3.0];
        let rhs = [1.0, -2.0, 0.5];

        let mut lu = NumericMatrix::dense(a.clone());
        lu.factorize_in_place().unwrap();
        assert_eq!(lu.factorization_state(), FactorizationState::LuInPlace);
        let mut x = rhs;
        lu.solve_in_place(&mut x).unwrap();
        assert!(residual(&a, &x, &rhs) < 1e-12);

        let mut chol = NumericMatrix::dense(a.clone());
        chol.factorize_cholesky_in_place().unwrap();
        let mut x = rhs;
        chol.solve_in_place(&mut x).unwrap();
        assert!(residual(&a, &x, &rhs) < 1e-12);

        let mut qr = NumericMatrix::dense(a.clone());
        qr.factorize_qr().unwrap();
        let mut x = rhs;
        qr.solve_in_place(&mut x).unwrap();
        assert!(residual(&a, &x, &rhs) < 1e-12);

        let mut inv = NumericMatrix::dense(a.clone());
        inv.invert_in_place().unwrap();
        let mut x = rhs;
        inv.solve_in_place(&mut x).unwrap();
        assert!(residual(&a, &x, &rhs) < 1e-12);
    }

    #[test]
    fn test_singular_matrix_reports_pivot() {
        let mut m = NumericMatrix::dense(dmatrix![1.0, 2.0; 2.0, 4.0]);
        let mut b = [1.0, 1.0];
        assert!(matches!(
            m.solve_in_place(&mut b),
            Err(Error::SingularMatrix { pivot: 1 })
        ));
        let mut z = NumericMatrix::zero(2, 2);
        assert!(matches!(
            z.solve_in_place(&mut b),
            Err(Error::SingularMatrix { pivot: 0 })
        ));
    }

    #[test]
    fn test_triangular_solve_without_factorization() {
        let t = TriangularMatrix::new(dmatrix![2.0, 0.0; 1.0, 4.0], Uplo::Lower).unwrap();
        let mut m = NumericMatrix::triangular(t);
        let mut b = [2.0, 9.0];
        m.solve_in_place(&mut b).unwrap();
        assert_eq!(b, [1.0, 2.0]);
        assert!(!m.is_factorized());
    }

    #[test]
    fn test_least_squares_tall() {
        // Fit y = c0 + c1 t through (0, 1), (1, 3), (2, 5).
        let mut m = NumericMatrix::dense(dmatrix![1.0, 0.0; 1.0, 1.0; 1.0, 2.0]);
        let x = m.solve_least_squares(&[1.0, 3.0, 5.0]).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_solve_matrix_in_place() {
        let mut m = NumericMatrix::dense(dmatrix![2.0, 0.0; 0.0, 4.0]);
        let mut b = dmatrix![2.0, 4.0; 4.0, 8.0];
        m.solve_matrix_in_place(&mut b).unwrap();
        assert_eq!(b, dmatrix![1.0, 2.0; 1.0, 2.0]);
    }

    #[test]
    fn test_norms() {
        let m = NumericMatrix::dense(dmatrix![1.0, -2.0; -3.0, 0.5]);
        assert_eq!(m.norm_inf(), 3.5);
        assert_eq!(m.norm_inf_by_column(), vec![3.0, 2.0]);
        assert_eq!(NumericMatrix::identity(2).norm_inf_by_column(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_add_and_sub_across_kinds() {
        let mut m = NumericMatrix::dense(dmatrix![1.0, 2.0; 3.0, 4.0]);
        m.add_assign(&NumericMatrix::identity(2)).unwrap();
        assert_eq!(m.to_dense(), dmatrix![2.0, 2.0; 3.0, 5.0]);
        m.sub_assign(&NumericMatrix::zero(2, 2)).unwrap();
        assert_eq!(m.to_dense(), dmatrix![2.0, 2.0; 3.0, 5.0]);

        let mut z = NumericMatrix::zero(2, 2);
        z.sub_assign(&NumericMatrix::identity(2)).unwrap();
        assert_eq!(z.to_dense(), dmatrix![-1.0, 0.0; 0.0, -1.0]);

        let mut wrong = NumericMatrix::zeros(3, 2);
        assert!(matches!(
            wrong.add_assign(&m),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_block_add_mixed_grid_keeps_left_grid() {
        let a = NumericMatrix::dense(dmatrix![1.0, 0.0; 0.0, 1.0]).into_shared();
        let b = NumericMatrix::dense(dmatrix![1.0]).into_shared();
        let left = BlockMatrix::from_2x2(Some(Rc::clone(&a)), None, None, Some(b)).unwrap();
        let mut m = NumericMatrix::block(left);

        let other = NumericMatrix::dense(DMatrix::from_element(3, 3, 1.0));
        m.add_assign(&other).unwrap();

        let Storage::Block(bm) = m.storage() else {
            panic!("block storage expected");
        };
        assert_eq!(bm.tab_row(), &[2, 3]);
        assert_eq!(a.borrow().to_dense(), dmatrix![2.0, 1.0; 1.0, 2.0]);
        assert_eq!(m.to_dense(), dmatrix![2.0, 1.0, 1.0; 1.0, 2.0, 1.0; 1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_block_add_same_grid_updates_aliases() {
        let a = NumericMatrix::dense(dmatrix![1.0]).into_shared();
        let left = BlockMatrix::from_blocks(1, 1, vec![Some(Rc::clone(&a))]).unwrap();
        let right = BlockMatrix::from_blocks(1, 1, vec![Some(NumericMatrix::dense(dmatrix![2.0]).into_shared())]).unwrap();
        let mut m = NumericMatrix::block(left);
        m.add_assign(&NumericMatrix::block(right)).unwrap();
        assert_eq!(a.borrow().get(0, 0).unwrap(), 3.0);
    }

    #[test]
    fn test_block_factorization_detects_alias_write() {
        let a = NumericMatrix::dense(dmatrix![2.0, 0.0; 0.0, 2.0]).into_shared();
        let d = NumericMatrix::dense(dmatrix![4.0]).into_shared();
        let bm = BlockMatrix::from_2x2(Some(Rc::clone(&a)), None, None, Some(d)).unwrap();
        let mut m = NumericMatrix::block(bm);
        m.factorize().unwrap();

        a.borrow_mut().set(0, 0, 1.0).unwrap();
        let mut b = [1.0, 2.0, 4.0];
        m.solve_in_place(&mut b).unwrap();
        assert!((b[0] - 1.0).abs() < 1e-14);
        assert!((b[1] - 1.0).abs() < 1e-14);
        assert!((b[2] - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_transpose_kinds() {
        let mut d = NumericMatrix::dense(dmatrix![1.0, 2.0, 3.0]);
        d.transpose_in_place();
        assert_eq!(d.shape(), (3, 1));

        let mut z = NumericMatrix::zero(2, 5);
        z.transpose_in_place();
        assert_eq!(z.shape(), (5, 2));

        let mut coo = CooMatrix::new(2, 3);
        coo.push(0, 2, 7.0);
        let mut c = NumericMatrix::coordinate(coo);
        c.transpose_in_place();
        assert_eq!(c.get(2, 0).unwrap(), 7.0);
    }

    #[test]
    fn test_resize() {
        let mut m = NumericMatrix::dense(dmatrix![1.0, 2.0; 3.0, 4.0]);
        m.resize(3, 1, true).unwrap();
        assert_eq!(m.to_dense(), dmatrix![1.0; 3.0; 0.0]);
        m.resize(2, 2, false).unwrap();
        assert_eq!(m.to_dense(), DMatrix::zeros(2, 2));

        let mut id = NumericMatrix::identity(2);
        id.resize(2, 3, true).unwrap();
        assert_eq!(id.to_dense(), dmatrix![1.0, 0.0, 0.0; 0.0, 1.0, 0.0]);

        let bm = BlockMatrix::from_blocks(1, 1, vec![Some(NumericMatrix::zeros(2, 2).into_shared())]).unwrap();
        let mut blk = NumericMatrix::block(bm);
        assert!(blk.resize(2, 2, true).is_ok());
        assert!(matches!(blk.resize(3, 3, true), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_resize_banded() {
        let mut m = NumericMatrix::dense(dmatrix![1.0, 2.0, 3.0; 4.0, 5.0, 6.0; 7.0, 8.0, 9.0]);
        m.resize_banded(3, 3, 1, 0, true);
        assert_eq!(m.kind(), StorageKind::Banded);
        assert_eq!(m.to_dense(), dmatrix![1.0, 0.0, 0.0; 4.0, 5.0, 0.0; 0.0, 8.0, 9.0]);
    }

    #[test]
    fn test_gemv_and_row_dot() {
        let dense = dmatrix![1.0, 0.0, 2.0; 0.0, 3.0, 0.0];
        let m = NumericMatrix::sparse(CsrMatrix::from(&dense));
        let x = [1.0, 2.0, 3.0];
        let mut y = [1.0, 1.0];
        m.gemv(2.0, &x, -1.0, &mut y).unwrap();
        assert_eq!(y, [13.0, 11.0]);
        assert_eq!(m.row_dot(0, &x).unwrap(), 7.0);
        assert!(m.gemv(1.0, &[1.0], 0.0, &mut y).is_err());
    }

    #[test]
    fn test_assign_and_fill() {
        let mut m = NumericMatrix::zero(2, 2);
        m.assign(&NumericMatrix::identity(2));
        assert_eq!(m.kind(), StorageKind::Identity);
        m.fill(3.0);
        assert_eq!(m.to_dense(), DMatrix::from_element(2, 2, 3.0));
    }
}
