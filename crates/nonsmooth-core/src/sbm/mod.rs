//! Sparse block-structured matrices.
//!
//! A [`SparseBlockMatrix`] stores small dense blocks in compressed block-row
//! form: `index1[r]..index1[r + 1]` is the range of stored blocks in block
//! row `r`, and `index2[b]` is the block column of stored block `b`. Block
//! boundaries are kept as cumulative end offsets, so block row `r` covers
//! rows `row_offsets[r - 1]..row_offsets[r]` (with an implicit leading zero).
//!
//! Blocks are held through [`SharedBlock`] handles. Permutations build a new
//! index structure over the same handles, so writes through one view are seen
//! by the other.

mod coordinate;
mod ops;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::rc::Rc;

use nalgebra::DMatrix;

use crate::error::{Error, Result};
use crate::grid::{cumulative, locate, span};
use crate::version::next_version;

pub use coordinate::SparseBlockCoordinateMatrix;

/// Shared handle to one dense block.
pub type SharedBlock = Rc<RefCell<DMatrix<f64>>>;

#[derive(Debug)]
pub struct SparseBlockMatrix {
    row_offsets: Vec<usize>,
    col_offsets: Vec<usize>,
    index1: Vec<usize>,
    index2: Vec<usize>,
    blocks: Vec<SharedBlock>,
    diagonal_cache: RefCell<Option<(u64, Vec<Option<usize>>)>>,
    version: u64,
}

impl SparseBlockMatrix {
    /// Empty matrix over blocks of the given heights and widths.
    pub fn new(row_sizes: &[usize], col_sizes: &[usize]) -> Self {
        Self {
            row_offsets: cumulative(row_sizes),
            col_offsets: cumulative(col_sizes),
            index1: vec![0; row_sizes.len() + 1],
            index2: Vec::new(),
            blocks: Vec::new(),
            diagonal_cache: RefCell::new(None),
            version: next_version(),
        }
    }

    /// Assemble from an ordered map of blocks. Shapes are assumed checked.
    pub(crate) fn from_block_map(
        row_offsets: Vec<usize>,
        col_offsets: Vec<usize>,
        map: BTreeMap<(usize, usize), SharedBlock>,
    ) -> Self {
        let block_rows = row_offsets.len();
        let mut index1 = vec![0; block_rows + 1];
        let mut index2 = Vec::with_capacity(map.len());
        let mut blocks = Vec::with_capacity(map.len());
        for ((r, c), block) in map {
            index1[r + 1] += 1;
            index2.push(c);
            blocks.push(block);
        }
        for r in 0..block_rows {
            index1[r + 1] += index1[r];
        }
        Self {
            row_offsets,
            col_offsets,
            index1,
            index2,
            blocks,
            diagonal_cache: RefCell::new(None),
            version: next_version(),
        }
    }

    /// Bulk conversion from block coordinate form. Duplicates are summed.
    pub fn from_coordinate(coo: &SparseBlockCoordinateMatrix) -> Self {
        let mut map: BTreeMap<(usize, usize), DMatrix<f64>> = BTreeMap::new();
        for (r, c, block) in coo.entries() {
            map.entry((*r, *c))
                .and_modify(|acc| *acc += block)
                .or_insert_with(|| block.clone());
        }
        let shared = map
            .into_iter()
            .map(|(key, block)| (key, Rc::new(RefCell::new(block))))
            .collect();
        Self::from_block_map(cumulative(coo.row_sizes()), cumulative(coo.col_sizes()), shared)
    }

    /// Split a dense matrix into blocks; all-zero blocks are not stored.
    pub fn from_dense(dense: &DMatrix<f64>, row_sizes: &[usize], col_sizes: &[usize]) -> Result<Self> {
        let row_offsets = cumulative(row_sizes);
        let col_offsets = cumulative(col_sizes);
        let total = (
            row_offsets.last().copied().unwrap_or(0),
            col_offsets.last().copied().unwrap_or(0),
        );
        if dense.shape() != total {
            return Err(Error::shape("sparse block from dense", total, dense.shape()));
        }
        let mut map = BTreeMap::new();
        for r in 0..row_offsets.len() {
            let (r0, rs) = span(&row_offsets, r);
            for c in 0..col_offsets.len() {
                let (c0, cs) = span(&col_offsets, c);
                let view = dense.view((r0, c0), (rs, cs));
                if view.iter().any(|v| *v != 0.0) {
                    map.insert((r, c), Rc::new(RefCell::new(view.into_owned())));
                }
            }
        }
        Ok(Self::from_block_map(row_offsets, col_offsets, map))
    }

    /// Build from scalar `(row, col, value)` triplets; duplicates are summed.
    pub fn from_triplets(
        triplets: &[(usize, usize, f64)],
        row_sizes: &[usize],
        col_sizes: &[usize],
    ) -> Result<Self> {
        let mut sbm = Self::new(row_sizes, col_sizes);
        for &(row, col, value) in triplets {
            sbm.add_value(row, col, value)?;
        }
        Ok(sbm)
    }

    pub fn nrows(&self) -> usize {
        self.row_offsets.last().copied().unwrap_or(0)
    }

    pub fn ncols(&self) -> usize {
        self.col_offsets.last().copied().unwrap_or(0)
    }

    pub fn block_rows(&self) -> usize {
        self.row_offsets.len()
    }

    pub fn block_cols(&self) -> usize {
        self.col_offsets.len()
    }

    /// Cumulative row end offsets, one per block row.
    pub fn row_offsets(&self) -> &[usize] {
        &self.row_offsets
    }

    /// Cumulative column end offsets, one per block column.
    pub fn col_offsets(&self) -> &[usize] {
        &self.col_offsets
    }

    /// First row and height of block row `r`.
    pub fn row_span(&self, r: usize) -> (usize, usize) {
        span(&self.row_offsets, r)
    }

    /// First column and width of block column `c`.
    pub fn col_span(&self, c: usize) -> (usize, usize) {
        span(&self.col_offsets, c)
    }

    pub fn index1(&self) -> &[usize] {
        &self.index1
    }

    pub fn index2(&self) -> &[usize] {
        &self.index2
    }

    pub fn nnz_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, b: usize) -> &SharedBlock {
        &self.blocks[b]
    }

    /// Stored blocks of block row `r` as `(block_index, block_col)` pairs.
    pub fn row_blocks(&self, r: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.index1[r]..self.index1[r + 1]).map(move |b| (b, self.index2[b]))
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Record a mutation that the index structure cannot observe, such as a
    /// write through a shared block handle.
    pub fn touch(&mut self) {
        self.version = next_version();
    }

    pub fn find_block(&self, block_row: usize, block_col: usize) -> Option<usize> {
        if block_row >= self.block_rows() {
            return None;
        }
        self.row_blocks(block_row)
            .find(|&(_, c)| c == block_col)
            .map(|(b, _)| b)
    }

    fn check_block_index(&self, block_row: usize, block_col: usize) -> Result<()> {
        if block_row >= self.block_rows() || block_col >= self.block_cols() {
            return Err(Error::BlockIndexOutOfRange {
                block_row,
                block_col,
                block_rows: self.block_rows(),
                block_cols: self.block_cols(),
            });
        }
        Ok(())
    }

    /// Insert or replace the block at `(block_row, block_col)`.
    ///
    /// Returns the stored block index. Inserting a new block rebuilds the
    /// index arrays.
    pub fn insert_block(&mut self, block_row: usize, block_col: usize, block: DMatrix<f64>) -> Result<usize> {
        self.check_block_index(block_row, block_col)?;
        let expected = (self.row_span(block_row).1, self.col_span(block_col).1);
        if block.shape() != expected {
            return Err(Error::shape("sparse block insert", expected, block.shape()));
        }
        self.version = next_version();
        if let Some(b) = self.find_block(block_row, block_col) {
            *self.blocks[b].borrow_mut() = block;
            return Ok(b);
        }

        let pos = self
            .row_blocks(block_row)
            .find(|&(_, c)| c > block_col)
            .map(|(b, _)| b)
            .unwrap_or(self.index1[block_row + 1]);
        self.index2.insert(pos, block_col);
        self.blocks.insert(pos, Rc::new(RefCell::new(block)));
        for start in &mut self.index1[block_row + 1..] {
            *start += 1;
        }
        Ok(pos)
    }

    /// Share an existing block handle at `(block_row, block_col)`.
    pub fn insert_shared_block(&mut self, block_row: usize, block_col: usize, block: SharedBlock) -> Result<usize> {
        let shape = block.borrow().shape();
        let b = self.insert_block(block_row, block_col, DMatrix::zeros(shape.0, shape.1))?;
        self.blocks[b] = block;
        Ok(b)
    }

    fn locate_entry(&self, row: usize, col: usize) -> Result<((usize, usize), (usize, usize))> {
        match (locate(&self.row_offsets, row), locate(&self.col_offsets, col)) {
            (Some((br, i)), Some((bc, j))) => Ok(((br, bc), (i, j))),
            _ => Err(Error::IndexOutOfRange {
                row,
                col,
                rows: self.nrows(),
                cols: self.ncols(),
            }),
        }
    }

    fn block_for_write(&mut self, br: usize, bc: usize) -> Result<usize> {
        match self.find_block(br, bc) {
            Some(b) => {
                self.version = next_version();
                Ok(b)
            }
            None => {
                let (rs, cs) = (self.row_span(br).1, self.col_span(bc).1);
                self.insert_block(br, bc, DMatrix::zeros(rs, cs))
            }
        }
    }

    /// Set a scalar entry, allocating a zero block when none is stored.
    pub fn entry(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let ((br, bc), (i, j)) = self.locate_entry(row, col)?;
        let b = self.block_for_write(br, bc)?;
        self.blocks[b].borrow_mut()[(i, j)] = value;
        Ok(())
    }

    /// Add to a scalar entry, allocating a zero block when none is stored.
    pub fn add_value(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let ((br, bc), (i, j)) = self.locate_entry(row, col)?;
        let b = self.block_for_write(br, bc)?;
        self.blocks[b].borrow_mut()[(i, j)] += value;
        Ok(())
    }

    /// Scalar entry; zero when the owning block is not stored.
    pub fn get_value(&self, row: usize, col: usize) -> Result<f64> {
        let ((br, bc), (i, j)) = self.locate_entry(row, col)?;
        Ok(self
            .find_block(br, bc)
            .map_or(0.0, |b| self.blocks[b].borrow()[(i, j)]))
    }

    /// Fingerprint of the block structure and every stored value.
    ///
    /// Writes through a [`SharedBlock`] handle do not move
    /// [`version`](Self::version); they do change this hash.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.row_offsets.hash(&mut hasher);
        self.col_offsets.hash(&mut hasher);
        self.index1.hash(&mut hasher);
        self.index2.hash(&mut hasher);
        for block in &self.blocks {
            for v in block.borrow().iter() {
                v.to_bits().hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Stored index of the diagonal block of block row `r`, if any.
    pub fn diagonal_block_index(&self, r: usize) -> Option<usize> {
        self.diagonal_block_indices().get(r).copied().flatten()
    }

    /// Stored indices of all diagonal blocks, cached until the next mutation.
    pub fn diagonal_block_indices(&self) -> Vec<Option<usize>> {
        if let Some((stamp, cached)) = self.diagonal_cache.borrow().as_ref() {
            if *stamp == self.version {
                return cached.clone();
            }
        }
        let indices: Vec<Option<usize>> = (0..self.block_rows())
            .map(|r| self.find_block(r, r))
            .collect();
        log::trace!("recomputed {} diagonal block indices", indices.len());
        *self.diagonal_cache.borrow_mut() = Some((self.version, indices.clone()));
        indices
    }

    /// Copy out the dense equivalent.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.nrows(), self.ncols());
        for r in 0..self.block_rows() {
            let (r0, rs) = self.row_span(r);
            for (b, c) in self.row_blocks(r) {
                let (c0, cs) = self.col_span(c);
                dense
                    .view_mut((r0, c0), (rs, cs))
                    .copy_from(&*self.blocks[b].borrow());
            }
        }
        dense
    }

    /// Nonzero entries as global `(row, col, value)` triplets.
    pub fn triplets(&self) -> Vec<(usize, usize, f64)> {
        let mut out = Vec::new();
        for r in 0..self.block_rows() {
            let (r0, _) = self.row_span(r);
            for (b, c) in self.row_blocks(r) {
                let (c0, _) = self.col_span(c);
                let block = self.blocks[b].borrow();
                for j in 0..block.ncols() {
                    for i in 0..block.nrows() {
                        let v = block[(i, j)];
                        if v != 0.0 {
                            out.push((r0 + i, c0 + j, v));
                        }
                    }
                }
            }
        }
        out
    }

    /// Independent copy of the index structure sharing the same block handles.
    pub fn share(&self) -> Self {
        Self {
            row_offsets: self.row_offsets.clone(),
            col_offsets: self.col_offsets.clone(),
            index1: self.index1.clone(),
            index2: self.index2.clone(),
            blocks: self.blocks.clone(),
            diagonal_cache: RefCell::new(None),
            version: next_version(),
        }
    }
}

/// Deep copy: the clone owns fresh blocks.
impl Clone for SparseBlockMatrix {
    fn clone(&self) -> Self {
        Self {
            row_offsets: self.row_offsets.clone(),
            col_offsets: self.col_offsets.clone(),
            index1: self.index1.clone(),
            index2: self.index2.clone(),
            blocks: self
                .blocks
                .iter()
                .map(|b| Rc::new(RefCell::new(b.borrow().clone())))
                .collect(),
            diagonal_cache: RefCell::new(None),
            version: self.version,
        }
    }
}

impl PartialEq for SparseBlockMatrix {
    fn eq(&self, other: &Self) -> bool {
        self.row_offsets == other.row_offsets
            && self.col_offsets == other.col_offsets
            && self.to_dense() == other.to_dense()
    }
}
