//! Numerics `.dat` problem files.
//!
//! Plain-text reader and writer for linear complementarity and
//! friction-contact problems. A file is a sequence of whitespace-separated
//! values; `#` starts a comment.
//!
//! ```text
//! LCP:       size, matrix, q
//! friction:  dimension, contacts, matrix, q, mu
//! matrix:    storage id, then
//!              0  rows cols, values column by column
//!              1  block_rows block_cols stored_blocks,
//!                 cumulative row offsets, cumulative column offsets,
//!                 per block: block_row block_col values (column-major)
//!              2  rows cols entries, per entry: row col value
//! ```

pub mod error;
mod lexer;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::{
    load_friction_contact, load_lcp, parse_friction_contact, parse_lcp, read_friction_contact,
    read_lcp,
};
pub use writer::{save_friction_contact, save_lcp, write_friction_contact, write_lcp};

/// Storage id of a dense column-major matrix section.
pub const DENSE: usize = 0;
/// Storage id of a sparse block matrix section.
pub const SPARSE_BLOCK: usize = 1;
/// Storage id of a triplet matrix section.
pub const TRIPLETS: usize = 2;
