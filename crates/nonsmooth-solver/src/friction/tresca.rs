//! Tresca fixed point for Coulomb friction.
//!
//! Coulomb friction is the fixed point `g = mu r_n` of the Tresca problem
//! whose slide thresholds are `g`. Each outer iteration solves a Tresca
//! problem with nonsmooth Gauss-Seidel and updates the thresholds.

use super::{compute_error, tresca_compute_error};
use crate::error::{Error, Result};
use crate::options::{NsgsOptions, TrescaFixedPointOptions};
use crate::outcome::{SolverOutcome, SolverStatus};
use crate::problem::{FrictionContactProblem, LocalContactProblem};
use crate::projection::project_on_cylinder;
use crate::vector::{all_finite, axpy, distance};

/// Projected steps `r ← P_C(r - rho (W r + q))` with `rho = 1 / ‖W‖_∞`
/// until `‖r - P_C(r - u)‖ <= tolerance`.
fn solve_tresca_contact(
    local: &LocalContactProblem,
    threshold: f64,
    r: &mut [f64],
    max_iterations: usize,
    tolerance: f64,
) {
    let d = local.dimension();
    let norm = (0..d)
        .map(|i| (0..d).map(|j| local.w[(i, j)].abs()).sum::<f64>())
        .fold(0.0, f64::max);
    let rho = if norm > 0.0 { 1.0 / norm } else { 1.0 };
    let mut u = vec![0.0; d];
    let mut p = vec![0.0; d];
    for iteration in 0..max_iterations {
        local.velocity(r, &mut u);
        for ((pk, rk), uk) in p.iter_mut().zip(r.iter()).zip(&u) {
            *pk = rk - uk;
        }
        project_on_cylinder(&mut p, threshold);
        if distance(r, &p) <= tolerance {
            log::trace!("tresca local solver: {iteration} iterations");
            return;
        }
        axpy(-rho, &u, r);
        project_on_cylinder(r, threshold);
    }
}

/// Nonsmooth Gauss-Seidel for the Tresca problem with per-contact slide
/// thresholds.
pub fn tresca_nsgs(
    problem: &FrictionContactProblem,
    thresholds: &[f64],
    reaction: &mut [f64],
    velocity: &mut [f64],
    options: &NsgsOptions,
) -> Result<SolverOutcome> {
    options.validate()?;
    problem.check_buffers(reaction, velocity)?;
    let d = problem.dimension();
    let nc = problem.number_of_contacts();
    if thresholds.len() != nc {
        return Err(Error::dimension("slide thresholds", nc, thresholds.len()));
    }

    let mut local_tolerance = options.local.tolerance;
    let mut last = reaction.to_vec();
    let mut error = f64::INFINITY;
    let mut outcome = None;

    for iteration in 1..=options.max_iterations {
        for contact in 0..nc {
            let local = problem.local_problem(contact, reaction)?;
            let r = &mut reaction[contact * d..(contact + 1) * d];
            solve_tresca_contact(
                &local,
                thresholds[contact],
                r,
                options.local.max_iterations,
                local_tolerance,
            );
        }
        if !all_finite(reaction) {
            reaction.copy_from_slice(&last);
            outcome = Some(SolverOutcome::breakdown(
                iteration - 1,
                error,
                "non-finite reaction",
            ));
            break;
        }
        last.copy_from_slice(reaction);

        error = tresca_compute_error(problem, thresholds, reaction, velocity, options.tolerance)?
            .error;
        log::trace!("tresca nsgs: iteration {iteration}, error {error:e}");
        if error <= options.tolerance {
            outcome = Some(SolverOutcome::converged(iteration, error));
            break;
        }
        local_tolerance =
            options
                .internal
                .inner_tolerance(error, options.tolerance, nc, local_tolerance);
    }

    problem.velocity(reaction, velocity)?;
    let outcome =
        outcome.unwrap_or_else(|| SolverOutcome::iteration_limit(options.max_iterations, error));
    outcome.log("tresca nsgs");
    Ok(outcome)
}

/// Outer fixed point on the slide thresholds `g_i = mu_i r_n,i`.
///
/// The inner Tresca tolerance starts at `options.inner.tolerance` and
/// follows the Coulomb error through `options.internal`. An inner
/// breakdown ends the run with the last finite outer iterate.
pub fn tresca_fixed_point(
    problem: &FrictionContactProblem,
    reaction: &mut [f64],
    velocity: &mut [f64],
    options: &TrescaFixedPointOptions,
) -> Result<SolverOutcome> {
    options.validate()?;
    problem.check_buffers(reaction, velocity)?;
    let d = problem.dimension();
    let nc = problem.number_of_contacts();
    log::debug!("tresca fixed point: {nc} contacts in {d}D");

    let mut inner = options.inner.clone();
    let mut thresholds = vec![0.0; nc];
    let mut last = reaction.to_vec();
    let mut error = f64::INFINITY;
    let mut outcome = None;

    for iteration in 1..=options.max_iterations {
        for ((g, r), &mu) in thresholds
            .iter_mut()
            .zip(reaction.chunks_exact(d))
            .zip(problem.mu())
        {
            *g = mu * r[0].max(0.0);
        }
        let inner_outcome = tresca_nsgs(problem, &thresholds, reaction, velocity, &inner)?;
        if let SolverStatus::NumericalBreakdown(reason) = inner_outcome.status {
            reaction.copy_from_slice(&last);
            outcome = Some(SolverOutcome::breakdown(
                iteration - 1,
                error,
                format!("inner Tresca solver: {reason}"),
            ));
            break;
        }
        last.copy_from_slice(reaction);

        error = compute_error(problem, reaction, velocity, options.tolerance)?.error;
        log::trace!(
            "tresca fixed point: iteration {iteration}, error {error:e}, inner iterations {}",
            inner_outcome.iterations
        );
        if error <= options.tolerance {
            outcome = Some(SolverOutcome::converged(iteration, error));
            break;
        }
        inner.tolerance =
            options
                .internal
                .inner_tolerance(error, options.tolerance, nc, inner.tolerance);
    }

    problem.velocity(reaction, velocity)?;
    let outcome =
        outcome.unwrap_or_else(|| SolverOutcome::iteration_limit(options.max_iterations, error));
    outcome.log("tresca fixed point");
    Ok(outcome)
}
