//! Error types for nonsmooth-core.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("index ({row}, {col}) out of range for {rows}x{cols} matrix")]
    IndexOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("block ({block_row}, {block_col}) out of range for {block_rows}x{block_cols} block grid")]
    BlockIndexOutOfRange {
        block_row: usize,
        block_col: usize,
        block_rows: usize,
        block_cols: usize,
    },

    #[error("singular matrix: zero pivot at column {pivot}")]
    SingularMatrix { pivot: usize },

    #[error("{operation} is not supported for {kind} storage")]
    Unsupported {
        operation: &'static str,
        kind: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn shape(
        context: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Self {
        Error::ShapeMismatch {
            context,
            expected,
            actual,
        }
    }
}
