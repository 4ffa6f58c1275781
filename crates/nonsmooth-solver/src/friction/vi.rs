//! Friction contact as a variational inequality over the product of
//! Coulomb cones, `F(r) = M r + q + (mu ‖u_t‖, 0, ..)` per contact.

use super::de_saxce;
use crate::error::Result;
use crate::options::ProjectedGradientOptions;
use crate::outcome::SolverOutcome;
use crate::problem::{FrictionContactProblem, VariationalInequality};
use crate::projection::CoulombConeProjection;
use crate::vector::norm2;

/// VI reformulation of `problem`, normalized by `‖q‖` so that its
/// natural-map error is the Coulomb friction error.
pub fn as_variational_inequality(
    problem: &FrictionContactProblem,
) -> Result<VariationalInequality<'_>> {
    let d = problem.dimension();
    VariationalInequality::new(
        problem.size(),
        move |r: &[f64], f: &mut [f64]| {
            problem.velocity(r, f)?;
            for (u, &mu) in f.chunks_exact_mut(d).zip(problem.mu()) {
                de_saxce(u, mu);
            }
            Ok(())
        },
        CoulombConeProjection::new(d, problem.mu().to_vec()),
    )
    .with_normalization(norm2(problem.q()))
}

/// Projected extragradient on [`as_variational_inequality`].
pub fn extragradient(
    problem: &FrictionContactProblem,
    reaction: &mut [f64],
    velocity: &mut [f64],
    options: &ProjectedGradientOptions,
) -> Result<SolverOutcome> {
    problem.check_buffers(reaction, velocity)?;
    let vi = as_variational_inequality(problem)?;
    let outcome = crate::vi::extragradient(&vi, reaction, velocity, options)?;
    problem.velocity(reaction, velocity)?;
    Ok(outcome)
}

/// Fixed-point projection on [`as_variational_inequality`].
pub fn fixed_point_projection(
    problem: &FrictionContactProblem,
    reaction: &mut [f64],
    velocity: &mut [f64],
    options: &ProjectedGradientOptions,
) -> Result<SolverOutcome> {
    problem.check_buffers(reaction, velocity)?;
    let vi = as_variational_inequality(problem)?;
    let outcome = crate::vi::fixed_point_projection(&vi, reaction, velocity, options)?;
    problem.velocity(reaction, velocity)?;
    Ok(outcome)
}
