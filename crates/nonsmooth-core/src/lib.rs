//! Matrix structures for nonsmooth numerics.
//!
//! This crate provides the linear algebra layer shared by the complementarity
//! and friction-contact solvers: a polymorphic [`NumericMatrix`] over dense,
//! structured, sparse and block-composite storages with in-place
//! factorizations, and the [`SparseBlockMatrix`] block-row format used for
//! contact Delassus operators.

pub mod error;
mod grid;
pub mod matrix;
pub mod operator;
pub mod sbm;
mod version;

pub use error::{Error, Result};
pub use matrix::{
    BandedMatrix, BlockMatrix, FactorizationState, NumericMatrix, SharedMatrix, Storage,
    StorageKind, SymmetricMatrix, TriangularMatrix, Uplo,
};
pub use operator::LinearOperator;
pub use sbm::{SharedBlock, SparseBlockCoordinateMatrix, SparseBlockMatrix};
