//! Nonsmooth Gauss-Seidel over contacts.

use super::compute_error;
use super::local::{solve_contact, take_off};
use crate::error::Result;
use crate::options::NsgsOptions;
use crate::outcome::SolverOutcome;
use crate::problem::FrictionContactProblem;
use crate::vector::all_finite;

/// Sweep the contacts in order, solving each one with the others frozen.
///
/// The off-diagonal contribution `Σ_{j≠i} W_ij r_j` comes from
/// [`FrictionContactProblem::local_problem`], which uses the block-row
/// product of a sparse block `M` when one is available. The local tolerance
/// follows the global error through `options.internal` after every sweep.
pub fn nsgs(
    problem: &FrictionContactProblem,
    reaction: &mut [f64],
    velocity: &mut [f64],
    options: &NsgsOptions,
) -> Result<SolverOutcome> {
    options.validate()?;
    problem.check_buffers(reaction, velocity)?;
    let d = problem.dimension();
    let nc = problem.number_of_contacts();
    log::debug!(
        "nsgs: {nc} contacts in {d}D, local solver {:?}",
        options.local.kind
    );

    let mut local_tolerance = options.local.tolerance;
    let mut last = reaction.to_vec();
    let mut error = f64::INFINITY;
    let mut outcome = None;

    for iteration in 1..=options.max_iterations {
        for contact in 0..nc {
            let local = problem.local_problem(contact, reaction)?;
            let r = &mut reaction[contact * d..(contact + 1) * d];
            if !take_off(&local, r) {
                solve_contact(&local, r, &options.local, local_tolerance);
            }
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

        error = compute_error(problem, reaction, velocity, options.tolerance)?.error;
        log::trace!("nsgs: iteration {iteration}, error {error:e}");
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
    outcome.log("nsgs");
    Ok(outcome)
}
