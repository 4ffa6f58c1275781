//! Linear complementarity solvers.
//!
//! Direct: lexicographic Lemke. Iterative: projected Gauss-Seidel (with
//! over-relaxation), and the convex QP solvers applied to the QP
//! `min ½ zᵀ M z + qᵀ z, z >= 0` for symmetric positive semidefinite `M`.

mod lemke;
mod pgs;

pub use lemke::lemke;
pub use pgs::pgs;

use crate::error::{Error, Result};
use crate::options::{AdmmOptions, ProjectedGradientOptions, SolverOptions};
use crate::outcome::{ErrorEstimate, SolverOutcome};
use crate::problem::{ConvexQp, LinearComplementarityProblem};
use crate::projection::NonNegativeOrthant;
use crate::vector::{norm2, relative};

/// `‖z - max(0, z - w)‖₂` with `w = M z + q` recomputed into `w`, divided
/// by `‖q‖₂` when that is meaningfully non-zero.
///
/// Zero exactly when `0 <= z ⟂ w >= 0`.
pub fn compute_error(
    problem: &LinearComplementarityProblem,
    z: &[f64],
    w: &mut [f64],
    tolerance: f64,
) -> Result<ErrorEstimate> {
    problem.check_buffers(z, w)?;
    problem.velocity(z, w)?;
    let error = z
        .iter()
        .zip(w.iter())
        .map(|(zi, wi)| {
            let d = zi - (zi - wi).max(0.0);
            d * d
        })
        .sum::<f64>()
        .sqrt();
    Ok(ErrorEstimate::new(
        relative(error, norm2(problem.q())),
        tolerance,
    ))
}

/// The QP whose optimality conditions are the LCP when `M` is symmetric
/// positive semidefinite.
pub fn as_convex_qp(problem: &LinearComplementarityProblem) -> Result<ConvexQp<'static>> {
    ConvexQp::new(problem.m().clone(), problem.q().to_vec(), NonNegativeOrthant)
}

/// Projected gradient on [`as_convex_qp`].
pub fn projected_gradient(
    problem: &LinearComplementarityProblem,
    z: &mut [f64],
    w: &mut [f64],
    options: &ProjectedGradientOptions,
) -> Result<SolverOutcome> {
    problem.check_buffers(z, w)?;
    let qp = as_convex_qp(problem)?;
    crate::convex_qp::projected_gradient(&qp, z, w, options)
}

/// ADMM on [`as_convex_qp`].
pub fn admm(
    problem: &LinearComplementarityProblem,
    z: &mut [f64],
    w: &mut [f64],
    options: &AdmmOptions,
) -> Result<SolverOutcome> {
    problem.check_buffers(z, w)?;
    let qp = as_convex_qp(problem)?;
    let mut y = vec![0.0; problem.size()];
    crate::convex_qp::admm(&qp, z, w, &mut y, options)
}

/// Run the LCP solver selected by `options`.
pub fn solve(
    problem: &LinearComplementarityProblem,
    z: &mut [f64],
    w: &mut [f64],
    options: &SolverOptions,
) -> Result<SolverOutcome> {
    match options {
        SolverOptions::Lemke(o) => lemke(problem, z, w, o),
        SolverOptions::Pgs(o) => pgs(problem, z, w, o),
        SolverOptions::ProjectedGradient(o) => projected_gradient(problem, z, w, o),
        SolverOptions::Admm(o) => admm(problem, z, w, o),
        other => Err(Error::Configuration(format!(
            "{} is not an LCP solver",
            other.name()
        ))),
    }
}
