//! `.dat` writers.
//!
//! Reals are written with the shortest representation that parses back to
//! the same `f64`, so a write followed by a read reproduces the problem
//! exactly.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nonsmooth_core::{NumericMatrix, SparseBlockMatrix, Storage};
use nonsmooth_solver::{FrictionContactProblem, LinearComplementarityProblem};

use crate::error::Result;
use crate::{DENSE, SPARSE_BLOCK, TRIPLETS};

fn write_values(out: &mut impl Write, values: impl IntoIterator<Item = f64>) -> Result<()> {
    let mut first = true;
    for v in values {
        if !first {
            write!(out, " ")?;
        }
        write!(out, "{v:?}")?;
        first = false;
    }
    writeln!(out)?;
    Ok(())
}

fn write_offsets(out: &mut impl Write, offsets: &[usize]) -> Result<()> {
    let line: Vec<String> = offsets.iter().map(ToString::to_string).collect();
    writeln!(out, "{}", line.join(" "))?;
    Ok(())
}

fn write_sparse_block(out: &mut impl Write, sbm: &SparseBlockMatrix) -> Result<()> {
    writeln!(out, "{SPARSE_BLOCK}  # sparse block")?;
    writeln!(
        out,
        "{} {} {}",
        sbm.block_rows(),
        sbm.block_cols(),
        sbm.nnz_blocks()
    )?;
    write_offsets(out, sbm.row_offsets())?;
    write_offsets(out, sbm.col_offsets())?;
    for r in 0..sbm.block_rows() {
        for (b, c) in sbm.row_blocks(r) {
            write!(out, "{r} {c}  ")?;
            write_values(out, sbm.block(b).borrow().iter().copied())?;
        }
    }
    Ok(())
}

/// Matrix section. Sparse block storage is kept, CSR and coordinate
/// storages are written as triplets and every other storage as dense.
pub(crate) fn write_matrix(out: &mut impl Write, m: &NumericMatrix) -> Result<()> {
    match m.storage() {
        Storage::SparseBlock(sbm) => write_sparse_block(out, sbm),
        Storage::Sparse(_) | Storage::SparseCoordinate(_) => {
            let triplets = m.triplets();
            writeln!(out, "{TRIPLETS}  # triplets")?;
            writeln!(out, "{} {} {}", m.nrows(), m.ncols(), triplets.len())?;
            for (i, j, v) in triplets {
                writeln!(out, "{i} {j} {v:?}")?;
            }
            Ok(())
        }
        _ => {
            if m.kind() != nonsmooth_core::StorageKind::Dense {
                log::debug!("writing {} matrix as dense", m.kind());
            }
            let dense = m.to_dense();
            writeln!(out, "{DENSE}  # dense, column-major")?;
            writeln!(out, "{} {}", dense.nrows(), dense.ncols())?;
            for column in dense.column_iter() {
                write_values(out, column.iter().copied())?;
            }
            Ok(())
        }
    }
}

pub fn write_lcp(mut out: impl Write, problem: &LinearComplementarityProblem) -> Result<()> {
    writeln!(out, "# linear complementarity problem")?;
    writeln!(out, "{}  # size", problem.size())?;
    write_matrix(&mut out, problem.m())?;
    write_values(&mut out, problem.q().iter().copied())?;
    out.flush()?;
    Ok(())
}

pub fn write_friction_contact(mut out: impl Write, problem: &FrictionContactProblem) -> Result<()> {
    writeln!(out, "# friction-contact problem")?;
    writeln!(out, "{}  # dimension", problem.dimension())?;
    writeln!(out, "{}  # contacts", problem.number_of_contacts())?;
    write_matrix(&mut out, problem.m())?;
    write_values(&mut out, problem.q().iter().copied())?;
    write_values(&mut out, problem.mu().iter().copied())?;
    out.flush()?;
    Ok(())
}

pub fn save_lcp(path: impl AsRef<Path>, problem: &LinearComplementarityProblem) -> Result<()> {
    write_lcp(BufWriter::new(File::create(path)?), problem)
}

pub fn save_friction_contact(
    path: impl AsRef<Path>,
    problem: &FrictionContactProblem,
) -> Result<()> {
    write_friction_contact(BufWriter::new(File::create(path)?), problem)
}
