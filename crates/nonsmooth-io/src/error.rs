//! Error types for nonsmooth-io.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The file parsed but describes an inconsistent matrix.
    #[error(transparent)]
    Core(#[from] nonsmooth_core::Error),

    /// The file parsed but describes an invalid problem.
    #[error(transparent)]
    Solver(#[from] nonsmooth_solver::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
