//! Error types for nonsmooth-solver.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] nonsmooth_core::Error),

    #[error("invalid solver configuration: {0}")]
    Configuration(String),

    #[error("invalid problem: {0}")]
    InvalidProblem(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn dimension(context: &'static str, expected: usize, actual: usize) -> Self {
        Error::Core(nonsmooth_core::Error::ShapeMismatch {
            context,
            expected: (expected, 1),
            actual: (actual, 1),
        })
    }
}
