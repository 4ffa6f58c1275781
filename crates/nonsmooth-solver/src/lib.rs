//! Complementarity and friction-contact solvers.
//!
//! This crate provides:
//! - Problem descriptors: LCP, friction contact (2D/3D) with its
//!   normal/tangential split, convex QP, variational inequality, MCP
//! - Error metrics shared by every solver and the convergence report
//!   [`SolverOutcome`]
//! - Projection operators onto orthants, boxes, Coulomb cones and Tresca
//!   cylinders
//! - Structured, validated solver options with raw `iparam`/`dparam`
//!   conversion and JSON configuration
//! - Solvers: Lemke, PGS, projected gradient, ADMM, extragradient,
//!   Fischer-Burmeister Newton, NSGS and the Tresca fixed point
//!
//! Solvers write their solution into caller-owned buffers and return
//! `Err` only for invalid input or configuration; non-convergence and
//! numerical breakdown are reported through [`SolverStatus`].

pub mod convex_qp;
pub mod error;
pub mod friction;
pub mod lcp;
pub mod mcp;
pub mod options;
pub mod outcome;
pub mod problem;
pub mod projection;
pub mod tolerance;
mod vector;
pub mod vi;

pub use error::{Error, Result};
pub use options::{
    AdmmOptions, InitialRho, LemkeOptions, LocalSolverKind, LocalSolverOptions, NewtonOptions,
    NsgsOptions, PgsOptions, ProjectedGradientOptions, RawSolverOptions, RhoStrategy,
    SolverOptions, StepRule, TrescaFixedPointOptions,
};
pub use outcome::{ErrorEstimate, SolverOutcome, SolverStatus};
pub use problem::{
    ConvexQp, FrictionContactProblem, LinearComplementarityProblem, LinearConstraint,
    LocalContactProblem, MixedComplementarityProblem, SplitFrictionContactProblem,
    VariationalInequality,
};
pub use projection::{
    BoxProjection, ConeRegion, CoulombConeProjection, NonNegativeOrthant, Projection,
    TrescaCylinderProjection, Unconstrained,
};
pub use tolerance::{InternalErrorStrategy, InternalSolverTolerance};
