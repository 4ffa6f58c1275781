//! # Nonsmooth
//!
//! Numerics for nonsmooth mechanics: block-sparse linear algebra,
//! complementarity problems and Coulomb friction contact.
//!
//! The crate gathers:
//! - [`core`]: the polymorphic [`NumericMatrix`] and the
//!   [`SparseBlockMatrix`] used for contact Delassus operators
//! - [`solver`]: LCP, convex QP, VI, MCP and friction-contact problems with
//!   their solvers
//! - [`io`]: the `.dat` problem file format
//!
//! ## Quick Start
//!
//! ```rust
//! use nonsmooth::prelude::*;
//!
//! let m = NumericMatrix::dense(DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]));
//! let problem = LinearComplementarityProblem::new(m, vec![-5.0, -6.0]).unwrap();
//!
//! let (mut z, mut w) = ([0.0; 2], [0.0; 2]);
//! let outcome = lcp::lemke(&problem, &mut z, &mut w, &LemkeOptions::default()).unwrap();
//! assert!(outcome.is_converged());
//! assert!((z[0] - 4.0 / 3.0).abs() < 1e-10);
//! ```
//!
//! ## Friction contact
//!
//! ```rust
//! use nonsmooth::prelude::*;
//!
//! // One 3D contact, W = I, pushed into the surface and sideways.
//! let problem = FrictionContactProblem::new(
//!     3,
//!     NumericMatrix::identity(3),
//!     vec![-1.0, 1.0, 0.0],
//!     vec![0.5],
//! )
//! .unwrap();
//!
//! let options = SolverOptions::from_json(r#"{"solver": "nsgs", "tolerance": 1e-10}"#).unwrap();
//! let (mut r, mut u) = ([0.0; 3], [0.0; 3]);
//! let outcome = friction::solve(&problem, &mut r, &mut u, &options).unwrap();
//! assert!(outcome.is_converged());
//! assert!((r[1] + 0.5).abs() < 1e-8);
//! ```

// Re-export member crates
pub use nonsmooth_core as core;
pub use nonsmooth_io as io;
pub use nonsmooth_solver as solver;

// ============================================================================
// Convenient re-exports from nonsmooth_core
// ============================================================================

pub use nonsmooth_core::{
    BlockMatrix,
    // Errors
    Error as CoreError,
    LinearOperator,
    // Matrices
    NumericMatrix,
    SparseBlockMatrix,
    StorageKind,
};

// ============================================================================
// Convenient re-exports from nonsmooth_solver
// ============================================================================

pub use nonsmooth_solver::{
    ConvexQp,
    // Errors
    Error as SolverError,
    ErrorEstimate,
    // Problems
    FrictionContactProblem,
    LinearComplementarityProblem,
    MixedComplementarityProblem,
    // Options
    SolverOptions,
    // Reports
    SolverOutcome,
    SolverStatus,
    SplitFrictionContactProblem,
    VariationalInequality,
    // Solver families
    convex_qp,
    friction,
    lcp,
    mcp,
    vi,
};

// ============================================================================
// Convenient re-exports from nonsmooth_io
// ============================================================================

pub use nonsmooth_io::{
    // Errors
    Error as IoError,
    load_friction_contact,
    load_lcp,
    save_friction_contact,
    save_lcp,
};

// ============================================================================
// Re-export commonly used external types
// ============================================================================

/// Re-export of nalgebra's dynamic matrix type.
pub use nalgebra::DMatrix;

/// Re-export of nalgebra-sparse's compressed row matrix.
pub use nalgebra_sparse::CsrMatrix;

/// Prelude module containing commonly used types and solver families.
///
/// ```rust
/// use nonsmooth::prelude::*;
/// ```
pub mod prelude {
    // Matrices
    pub use crate::{DMatrix, NumericMatrix, SparseBlockMatrix, StorageKind};

    // Problems
    pub use crate::{
        FrictionContactProblem, LinearComplementarityProblem, MixedComplementarityProblem,
    };

    // Options and reports
    pub use crate::{SolverOptions, SolverOutcome, SolverStatus};
    pub use nonsmooth_solver::{LemkeOptions, NsgsOptions, PgsOptions};

    // Solver families
    pub use crate::{friction, lcp, mcp};

    // Files
    pub use crate::{load_friction_contact, load_lcp, save_friction_contact, save_lcp};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_solve() {
        let text = "2\n0\n2 2\n1 0 0 1\n-1 2\n";
        let problem = io::parse_lcp(text).unwrap();
        let (mut z, mut w) = ([0.0; 2], [0.0; 2]);
        let outcome = lcp::solve(
            &problem,
            &mut z,
            &mut w,
            &SolverOptions::Lemke(Default::default()),
        )
        .unwrap();
        assert!(outcome.is_converged());
        assert!((z[0] - 1.0).abs() < 1e-12 && z[1].abs() < 1e-12);
        assert!(w[0].abs() < 1e-12 && (w[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let sbm = SparseBlockMatrix::new(&[3, 3], &[3, 3]);
        let m = NumericMatrix::sparse_block(sbm);
        assert_eq!(m.kind(), StorageKind::SparseBlock);
        assert_eq!(m.shape(), (6, 6));
    }
}
