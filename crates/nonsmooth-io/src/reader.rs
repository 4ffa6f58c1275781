//! `.dat` readers.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use nonsmooth_core::{NumericMatrix, SparseBlockMatrix};
use nonsmooth_solver::{FrictionContactProblem, LinearComplementarityProblem};

use crate::error::{Error, Result};
use crate::lexer::Lexer;
use crate::{DENSE, SPARSE_BLOCK, TRIPLETS};

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        line,
        message: message.into(),
    }
}

/// Declared matrix dimensions must match the `size x size` problem matrix.
fn check_shape(line: usize, rows: usize, cols: usize, size: usize) -> Result<()> {
    if (rows, cols) != (size, size) {
        return Err(parse_error(
            line,
            format!("matrix is {rows}x{cols}, expected {size}x{size}"),
        ));
    }
    Ok(())
}

/// Cumulative end offsets to block sizes; offsets must be strictly
/// increasing and end at `size`.
fn offsets_to_sizes(lexer: &mut Lexer<'_>, count: usize, size: usize, what: &str) -> Result<Vec<usize>> {
    lexer.expect_remaining(count, what)?;
    let mut sizes = Vec::new();
    let mut previous = 0;
    let mut line = lexer.line();
    for _ in 0..count {
        let (end, at) = lexer.usize_at(what)?;
        line = at;
        if end <= previous {
            return Err(parse_error(
                line,
                format!("{what} must be strictly increasing, found {end} after {previous}"),
            ));
        }
        sizes.push(end - previous);
        previous = end;
    }
    if previous != size {
        return Err(parse_error(line, format!("{what} end at {previous}, expected {size}")));
    }
    Ok(sizes)
}

fn read_sparse_block(lexer: &mut Lexer<'_>, size: usize) -> Result<SparseBlockMatrix> {
    let (block_rows, line) = lexer.usize_at("block row count")?;
    let block_cols = lexer.usize("block column count")?;
    let nnz = lexer.usize("stored block count")?;
    if block_rows > size || block_cols > size {
        return Err(parse_error(
            line,
            format!("{block_rows}x{block_cols} block grid does not fit a {size}x{size} matrix"),
        ));
    }
    let row_sizes = offsets_to_sizes(lexer, block_rows, size, "row offsets")?;
    let col_sizes = offsets_to_sizes(lexer, block_cols, size, "column offsets")?;
    lexer.expect_remaining(nnz.saturating_mul(2), "block index")?;
    let mut sbm = SparseBlockMatrix::new(&row_sizes, &col_sizes);
    for _ in 0..nnz {
        let (r, line) = lexer.usize_at("block row index")?;
        let c = lexer.usize("block column index")?;
        if r >= block_rows || c >= block_cols {
            return Err(parse_error(
                line,
                format!("block ({r}, {c}) outside the {block_rows}x{block_cols} block grid"),
            ));
        }
        let (rows, cols) = (row_sizes[r], col_sizes[c]);
        let len = rows
            .checked_mul(cols)
            .ok_or_else(|| parse_error(line, format!("{rows}x{cols} block is too large")))?;
        let values = lexer.f64s(len, "block value")?;
        if sbm.find_block(r, c).is_some() {
            return Err(parse_error(line, format!("block ({r}, {c}) given twice")));
        }
        sbm.insert_block(r, c, DMatrix::from_column_slice(rows, cols, &values))?;
    }
    Ok(sbm)
}

fn read_triplets(lexer: &mut Lexer<'_>, size: usize) -> Result<CsrMatrix<f64>> {
    let (rows, line) = lexer.usize_at("row count")?;
    let cols = lexer.usize("column count")?;
    check_shape(line, rows, cols, size)?;
    let nnz = lexer.usize("entry count")?;
    lexer.expect_remaining(nnz.saturating_mul(3), "triplet value")?;
    let mut coo = CooMatrix::new(rows, cols);
    for _ in 0..nnz {
        let (i, line) = lexer.usize_at("row index")?;
        let j = lexer.usize("column index")?;
        let v = lexer.f64("entry value")?;
        if i >= rows || j >= cols {
            return Err(parse_error(
                line,
                format!("entry ({i}, {j}) outside a {rows}x{cols} matrix"),
            ));
        }
        coo.push(i, j, v);
    }
    Ok(CsrMatrix::from(&coo))
}

/// Matrix section of a `size x size` matrix: a storage id followed by its
/// content.
pub(crate) fn read_matrix(lexer: &mut Lexer<'_>, size: usize) -> Result<NumericMatrix> {
    let (id, line) = lexer.usize_at("matrix storage id")?;
    match id {
        DENSE => {
            let (rows, line) = lexer.usize_at("row count")?;
            let cols = lexer.usize("column count")?;
            check_shape(line, rows, cols, size)?;
            let len = rows
                .checked_mul(cols)
                .ok_or_else(|| parse_error(line, format!("{rows}x{cols} matrix is too large")))?;
            let values = lexer.f64s(len, "matrix value")?;
            Ok(NumericMatrix::from_column_major(rows, cols, &values)?)
        }
        SPARSE_BLOCK => Ok(NumericMatrix::sparse_block(read_sparse_block(lexer, size)?)),
        TRIPLETS => Ok(NumericMatrix::sparse(read_triplets(lexer, size)?)),
        other => Err(parse_error(line, format!("unknown matrix storage id {other}"))),
    }
}

/// Parse an LCP: size, matrix, then `q`.
pub fn parse_lcp(input: &str) -> Result<LinearComplementarityProblem> {
    let mut lexer = Lexer::new(input);
    let size = lexer.usize("problem size")?;
    lexer.expect_remaining(size, "q value")?;
    let m = read_matrix(&mut lexer, size)?;
    let q = lexer.f64s(size, "q value")?;
    lexer.expect_end()?;
    log::debug!("read LCP of size {size} ({} storage)", m.kind());
    Ok(LinearComplementarityProblem::new(m, q)?)
}

/// Parse a friction-contact problem: dimension, contact count, matrix, `q`
/// and `mu`.
pub fn parse_friction_contact(input: &str) -> Result<FrictionContactProblem> {
    let mut lexer = Lexer::new(input);
    let (dimension, line) = lexer.usize_at("contact dimension")?;
    if dimension != 2 && dimension != 3 {
        return Err(parse_error(
            line,
            format!("contact dimension must be 2 or 3, got {dimension}"),
        ));
    }
    let (contacts, line) = lexer.usize_at("contact count")?;
    let n = dimension
        .checked_mul(contacts)
        .ok_or_else(|| parse_error(line, format!("{contacts} contacts is too many")))?;
    lexer.expect_remaining(n.saturating_add(contacts), "q and friction value")?;
    let m = read_matrix(&mut lexer, n)?;
    let q = lexer.f64s(n, "q value")?;
    let mu = lexer.f64s(contacts, "friction coefficient")?;
    lexer.expect_end()?;
    log::debug!(
        "read {dimension}D friction-contact problem with {contacts} contacts ({} storage)",
        m.kind()
    );
    Ok(FrictionContactProblem::new(dimension, m, q, mu)?)
}

fn read_to_string(mut reader: impl Read) -> Result<String> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(text)
}

pub fn read_lcp(reader: impl Read) -> Result<LinearComplementarityProblem> {
    parse_lcp(&read_to_string(reader)?)
}

pub fn read_friction_contact(reader: impl Read) -> Result<FrictionContactProblem> {
    parse_friction_contact(&read_to_string(reader)?)
}

pub fn load_lcp(path: impl AsRef<Path>) -> Result<LinearComplementarityProblem> {
    read_lcp(File::open(path)?)
}

pub fn load_friction_contact(path: impl AsRef<Path>) -> Result<FrictionContactProblem> {
    read_friction_contact(File::open(path)?)
}
