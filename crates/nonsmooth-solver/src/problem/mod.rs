//! Problem descriptors.
//!
//! Constructors validate dimensions eagerly; solvers can then assume a
//! consistent problem.

mod convex_qp;
mod friction;
mod lcp;
mod mcp;
mod vi;

use std::sync::atomic::{AtomicU64, Ordering};

pub use convex_qp::{ConvexQp, LinearConstraint};
pub use friction::{FrictionContactProblem, LocalContactProblem, SplitFrictionContactProblem};
pub use lcp::LinearComplementarityProblem;
pub use mcp::{JacobianFunction, MixedComplementarityProblem};
pub use vi::{VariationalInequality, VectorFunction};

static STAMP: AtomicU64 = AtomicU64::new(1);

/// Fresh stamp for problem data, unique across problems.
pub(crate) fn next_stamp() -> u64 {
    STAMP.fetch_add(1, Ordering::Relaxed)
}
