//! Block-composite matrices built from shared sub-matrices.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use nalgebra::DMatrix;

use super::{NumericMatrix, scale_vector};
use crate::error::{Error, Result};
use crate::grid::{cumulative, locate, span};

/// Shared handle to a sub-matrix. Several composites may hold the same block.
pub type SharedMatrix = Rc<RefCell<NumericMatrix>>;

/// Matrix assembled from a grid of sub-matrices.
///
/// `tab_row[r]` is the row end offset of block row `r`; `tab_col` likewise
/// for block columns. Missing blocks read as zero. Writing into a missing
/// block allocates a dense zero block there.
#[derive(Debug)]
pub struct BlockMatrix {
    tab_row: Vec<usize>,
    tab_col: Vec<usize>,
    blocks: BTreeMap<(usize, usize), SharedMatrix>,
}

/// Block sizes must be non-zero so that the end offsets strictly increase.
fn check_sizes(context: &'static str, sizes: &[usize]) -> Result<()> {
    match sizes.iter().position(|&s| s == 0) {
        Some(k) => Err(Error::shape(context, (sizes.len(), 1), (k, 0))),
        None => Ok(()),
    }
}

impl BlockMatrix {
    /// Empty grid with the given block heights and widths, all non-zero.
    pub fn with_grid(row_sizes: &[usize], col_sizes: &[usize]) -> Result<Self> {
        check_sizes("block row height is zero", row_sizes)?;
        check_sizes("block column width is zero", col_sizes)?;
        Ok(Self {
            tab_row: cumulative(row_sizes),
            tab_col: cumulative(col_sizes),
            blocks: BTreeMap::new(),
        })
    }

    /// Build from a row-major list of optional blocks.
    ///
    /// Every block row and block column needs at least one block to fix its
    /// size. Blocks are shared, not copied.
    pub fn from_blocks(
        block_rows: usize,
        block_cols: usize,
        blocks: Vec<Option<SharedMatrix>>,
    ) -> Result<Self> {
        if blocks.len() != block_rows * block_cols {
            return Err(Error::shape(
                "block list",
                (block_rows, block_cols),
                (blocks.len(), 1),
            ));
        }

        let mut row_sizes = vec![None; block_rows];
        let mut col_sizes = vec![None; block_cols];
        for (k, block) in blocks.iter().enumerate() {
            let Some(block) = block else { continue };
            let (r, c) = (k / block_cols, k % block_cols);
            let (rows, cols) = block.borrow().shape();
            if let Some(height) = row_sizes[r] {
                if height != rows {
                    return Err(Error::shape("block row height", (height, cols), (rows, cols)));
                }
            }
            if let Some(width) = col_sizes[c] {
                if width != cols {
                    return Err(Error::shape("block column width", (rows, width), (rows, cols)));
                }
            }
            row_sizes[r] = Some(rows);
            col_sizes[c] = Some(cols);
        }

        let resolve = |sizes: Vec<Option<usize>>| -> Result<Vec<usize>> {
            sizes
                .into_iter()
                .enumerate()
                .map(|(k, s)| {
                    s.ok_or_else(|| Error::shape(
                        "block grid has an empty block row or column",
                        (block_rows, block_cols),
                        (k, 0),
                    ))
                })
                .collect()
        };
        let row_sizes = resolve(row_sizes)?;
        let col_sizes = resolve(col_sizes)?;

        let mut matrix = Self::with_grid(&row_sizes, &col_sizes)?;
        for (k, block) in blocks.into_iter().enumerate() {
            if let Some(block) = block {
                matrix.blocks.insert((k / block_cols, k % block_cols), block);
            }
        }
        Ok(matrix)
    }

    /// `[[a, b], [c, d]]` composite.
    pub fn from_2x2(
        a: Option<SharedMatrix>,
        b: Option<SharedMatrix>,
        c: Option<SharedMatrix>,
        d: Option<SharedMatrix>,
    ) -> Result<Self> {
        Self::from_blocks(2, 2, vec![a, b, c, d])
    }

    pub fn nrows(&self) -> usize {
        self.tab_row.last().copied().unwrap_or(0)
    }

    pub fn ncols(&self) -> usize {
        self.tab_col.last().copied().unwrap_or(0)
    }

    pub fn block_rows(&self) -> usize {
        self.tab_row.len()
    }

    pub fn block_cols(&self) -> usize {
        self.tab_col.len()
    }

    pub fn tab_row(&self) -> &[usize] {
        &self.tab_row
    }

    pub fn tab_col(&self) -> &[usize] {
        &self.tab_col
    }

    pub fn same_grid(&self, other: &BlockMatrix) -> bool {
        self.tab_row == other.tab_row && self.tab_col == other.tab_col
    }

    pub fn block(&self, block_row: usize, block_col: usize) -> Option<&SharedMatrix> {
        self.blocks.get(&(block_row, block_col))
    }

    /// Stored blocks in block-row-major order.
    pub fn blocks(&self) -> impl Iterator<Item = ((usize, usize), &SharedMatrix)> {
        self.blocks.iter().map(|(k, v)| (*k, v))
    }

    /// Place a shared block, replacing whatever was there.
    pub fn set_block(&mut self, block_row: usize, block_col: usize, block: SharedMatrix) -> Result<()> {
        if block_row >= self.block_rows() || block_col >= self.block_cols() {
            return Err(Error::BlockIndexOutOfRange {
                block_row,
                block_col,
                block_rows: self.block_rows(),
                block_cols: self.block_cols(),
            });
        }
        let expected = (
            span(&self.tab_row, block_row).1,
            span(&self.tab_col, block_col).1,
        );
        let actual = block.borrow().shape();
        if actual != expected {
            return Err(Error::shape("block placement", expected, actual));
        }
        self.blocks.insert((block_row, block_col), block);
        Ok(())
    }

    pub fn remove_block(&mut self, block_row: usize, block_col: usize) -> Option<SharedMatrix> {
        self.blocks.remove(&(block_row, block_col))
    }

    /// Owning block and local coordinates of a global entry.
    pub fn locate(&self, row: usize, col: usize) -> Option<((usize, usize), (usize, usize))> {
        let (br, i) = locate(&self.tab_row, row)?;
        let (bc, j) = locate(&self.tab_col, col)?;
        Some(((br, bc), (i, j)))
    }

    fn out_of_range(&self, row: usize, col: usize) -> Error {
        Error::IndexOutOfRange {
            row,
            col,
            rows: self.nrows(),
            cols: self.ncols(),
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        let ((br, bc), (i, j)) = self
            .locate(row, col)
            .ok_or_else(|| self.out_of_range(row, col))?;
        match self.blocks.get(&(br, bc)) {
            Some(block) => block.borrow().get(i, j),
            None => Ok(0.0),
        }
    }

    fn block_for_write(&mut self, br: usize, bc: usize) -> SharedMatrix {
        let (rows, cols) = (span(&self.tab_row, br).1, span(&self.tab_col, bc).1);
        Rc::clone(
            self.blocks
                .entry((br, bc))
                .or_insert_with(|| Rc::new(RefCell::new(NumericMatrix::zeros(rows, cols)))),
        )
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let ((br, bc), (i, j)) = self
            .locate(row, col)
            .ok_or_else(|| self.out_of_range(row, col))?;
        self.block_for_write(br, bc).borrow_mut().set(i, j, value)
    }

    pub fn add_at(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let ((br, bc), (i, j)) = self
            .locate(row, col)
            .ok_or_else(|| self.out_of_range(row, col))?;
        self.block_for_write(br, bc).borrow_mut().add_at(i, j, value)
    }

    /// Version stamps of every stored block, recursively.
    ///
    /// Two stamps compare equal only if no block was mutated in between.
    pub fn content_stamp(&self) -> Vec<u64> {
        let mut stamp = Vec::with_capacity(2 * self.blocks.len());
        for (&(r, c), block) in &self.blocks {
            stamp.push(((r as u64) << 32) | c as u64);
            stamp.extend(block.borrow().content_stamp());
        }
        stamp
    }

    /// Stored handles with repeats removed, for in-place block updates.
    pub(crate) fn unique_blocks(&self) -> Vec<&SharedMatrix> {
        let mut seen = HashSet::new();
        self.blocks
            .values()
            .filter(|b| seen.insert(Rc::as_ptr(b)))
            .collect()
    }

    /// `y = alpha * A x + beta * y`.
    pub fn gemv(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) -> Result<()> {
        if x.len() != self.ncols() || y.len() != self.nrows() {
            return Err(Error::shape(
                "block gemv",
                (self.nrows(), self.ncols()),
                (y.len(), x.len()),
            ));
        }
        scale_vector(y, beta);
        for (&(br, bc), block) in &self.blocks {
            let (r0, rs) = span(&self.tab_row, br);
            let (c0, cs) = span(&self.tab_col, bc);
            block
                .borrow()
                .gemv(alpha, &x[c0..c0 + cs], 1.0, &mut y[r0..r0 + rs])?;
        }
        Ok(())
    }

    /// Dot product of scalar row `row` with `x`, over the stored blocks of
    /// its block row.
    pub fn row_dot(&self, row: usize, x: &[f64]) -> Result<f64> {
        if x.len() != self.ncols() {
            return Err(Error::shape("block row dot", (1, self.ncols()), (1, x.len())));
        }
        let (br, i) = locate(&self.tab_row, row).ok_or_else(|| self.out_of_range(row, 0))?;
        let mut sum = 0.0;
        for (&(_, bc), block) in self.blocks.range((br, 0)..(br + 1, 0)) {
            let (c0, cs) = span(&self.tab_col, bc);
            sum += block.borrow().row_dot(i, &x[c0..c0 + cs])?;
        }
        Ok(sum)
    }

    /// Nonzero entries in global coordinates. Positions may repeat only if
    /// a sub-block itself reports repeats.
    pub fn triplets(&self) -> Vec<(usize, usize, f64)> {
        let mut out = Vec::new();
        for (&(br, bc), block) in &self.blocks {
            let r0 = span(&self.tab_row, br).0;
            let c0 = span(&self.tab_col, bc).0;
            out.extend(
                block
                    .borrow()
                    .triplets()
                    .into_iter()
                    .map(|(i, j, v)| (r0 + i, c0 + j, v)),
            );
        }
        out
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.nrows(), self.ncols());
        for (&(br, bc), block) in &self.blocks {
            let (r0, rs) = span(&self.tab_row, br);
            let (c0, cs) = span(&self.tab_col, bc);
            dense
                .view_mut((r0, c0), (rs, cs))
                .copy_from(&block.borrow().to_dense());
        }
        dense
    }

    /// Transposed composite owning copies of the transposed blocks.
    pub fn transposed(&self) -> BlockMatrix {
        let mut blocks = BTreeMap::new();
        for (&(br, bc), block) in &self.blocks {
            let mut copy = block.borrow().clone();
            copy.transpose_in_place();
            blocks.insert((bc, br), Rc::new(RefCell::new(copy)));
        }
        BlockMatrix {
            tab_row: self.tab_col.clone(),
            tab_col: self.tab_row.clone(),
            blocks,
        }
    }

    /// Recompute offsets from the current block shapes.
    ///
    /// Blocks may have been resized through their shared handles; sizes are
    /// taken from the first block found in each block row and column, and
    /// rows or columns without blocks keep their previous size.
    pub fn rederive_offsets(&mut self) -> Result<()> {
        let mut row_sizes = crate::grid::sizes(&self.tab_row);
        let mut col_sizes = crate::grid::sizes(&self.tab_col);
        let mut row_seen = vec![false; row_sizes.len()];
        let mut col_seen = vec![false; col_sizes.len()];
        for (&(br, bc), block) in &self.blocks {
            let (rows, cols) = block.borrow().shape();
            if row_seen[br] && row_sizes[br] != rows {
                return Err(Error::shape("block row heights", (row_sizes[br], cols), (rows, cols)));
            }
            if col_seen[bc] && col_sizes[bc] != cols {
                return Err(Error::shape("block column widths", (rows, col_sizes[bc]), (rows, cols)));
            }
            row_sizes[br] = rows;
            col_sizes[bc] = cols;
            row_seen[br] = true;
            col_seen[bc] = true;
        }
        check_sizes("block row height is zero", &row_sizes)?;
        check_sizes("block column width is zero", &col_sizes)?;
        self.tab_row = cumulative(&row_sizes);
        self.tab_col = cumulative(&col_sizes);
        Ok(())
    }
}

/// Deep copy: the clone owns fresh copies of every block, so aliasing
/// between blocks is not carried over.
impl Clone for BlockMatrix {
    fn clone(&self) -> Self {
        Self {
            tab_row: self.tab_row.clone(),
            tab_col: self.tab_col.clone(),
            blocks: self
                .blocks
                .iter()
                .map(|(k, b)| (*k, Rc::new(RefCell::new(b.borrow().clone()))))
                .collect(),
        }
    }
}
