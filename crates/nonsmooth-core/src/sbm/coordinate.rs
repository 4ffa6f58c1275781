//! Block coordinate (COO) form used to assemble sparse block matrices in bulk.

use nalgebra::DMatrix;

use crate::error::{Error, Result};

/// Unordered list of `(block_row, block_col, block)` entries over a fixed
/// block grid. Duplicate positions are summed on conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseBlockCoordinateMatrix {
    row_sizes: Vec<usize>,
    col_sizes: Vec<usize>,
    entries: Vec<(usize, usize, DMatrix<f64>)>,
}

impl SparseBlockCoordinateMatrix {
    /// Empty coordinate matrix over blocks of the given heights and widths.
    pub fn new(row_sizes: &[usize], col_sizes: &[usize]) -> Self {
        Self {
            row_sizes: row_sizes.to_vec(),
            col_sizes: col_sizes.to_vec(),
            entries: Vec::new(),
        }
    }

    /// Append a block. Its shape must match the grid at that position.
    pub fn push(&mut self, block_row: usize, block_col: usize, block: DMatrix<f64>) -> Result<()> {
        let (block_rows, block_cols) = (self.row_sizes.len(), self.col_sizes.len());
        if block_row >= block_rows || block_col >= block_cols {
            return Err(Error::BlockIndexOutOfRange {
                block_row,
                block_col,
                block_rows,
                block_cols,
            });
        }
        let expected = (self.row_sizes[block_row], self.col_sizes[block_col]);
        if block.shape() != expected {
            return Err(Error::shape("block coordinate entry", expected, block.shape()));
        }
        self.entries.push((block_row, block_col, block));
        Ok(())
    }

    pub fn row_sizes(&self) -> &[usize] {
        &self.row_sizes
    }

    pub fn col_sizes(&self) -> &[usize] {
        &self.col_sizes
    }

    pub fn entries(&self) -> &[(usize, usize, DMatrix<f64>)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
