//! Friction-contact solvers for 2D and 3D Coulomb problems.
//!
//! Errors are natural-map residuals on the De Saxcé formulation: with
//! `û_i = u_i + (mu_i ‖u_t,i‖, 0, ..)`, contact `i` is solved when
//! `r_i = P_K(r_i - û_i)`.

mod local;
mod nsgs;
mod tresca;
mod vi;

pub use local::{LocalSolve, solve_contact, take_off};
pub use nsgs::nsgs;
pub use tresca::{tresca_fixed_point, tresca_nsgs};
pub use vi::{as_variational_inequality, extragradient, fixed_point_projection};

use crate::error::{Error, Result};
use crate::options::SolverOptions;
use crate::outcome::{ErrorEstimate, SolverOutcome};
use crate::problem::FrictionContactProblem;
use crate::projection::{project_on_cone, project_on_cylinder};
use crate::vector::{norm2, relative};

/// Add the De Saxcé term `mu ‖u_t‖` to the normal velocity of one contact.
#[inline]
pub(crate) fn de_saxce(u: &mut [f64], mu: f64) {
    let norm_t = u[1..].iter().map(|t| t * t).sum::<f64>().sqrt();
    u[0] += mu * norm_t;
}

/// `‖r - P_K(r - û)‖` for one contact with velocity `u`.
pub fn local_error(r: &[f64], u: &[f64], mu: f64) -> f64 {
    let mut p: Vec<f64> = u.to_vec();
    de_saxce(&mut p, mu);
    for (pi, ri) in p.iter_mut().zip(r) {
        *pi = ri - *pi;
    }
    project_on_cone(&mut p, mu);
    p.iter()
        .zip(r)
        .map(|(pi, ri)| (ri - pi) * (ri - pi))
        .sum::<f64>()
        .sqrt()
}

/// Coulomb friction error of `r`, relative to `‖q‖`. `u` receives
/// `M r + q`.
pub fn compute_error(
    problem: &FrictionContactProblem,
    r: &[f64],
    u: &mut [f64],
    tolerance: f64,
) -> Result<ErrorEstimate> {
    problem.check_buffers(r, u)?;
    problem.velocity(r, u)?;
    let d = problem.dimension();
    let squared: f64 = r
        .chunks_exact(d)
        .zip(u.chunks_exact(d))
        .zip(problem.mu())
        .map(|((ri, ui), &mu)| {
            let e = local_error(ri, ui, mu);
            e * e
        })
        .sum();
    Ok(ErrorEstimate::new(
        relative(squared.sqrt(), norm2(problem.q())),
        tolerance,
    ))
}

/// Error of `r` for the Tresca problem with slide thresholds `thresholds`:
/// `‖r - P_C(r - u)‖` over the product of cylinders, relative to `‖q‖`.
pub fn tresca_compute_error(
    problem: &FrictionContactProblem,
    thresholds: &[f64],
    r: &[f64],
    u: &mut [f64],
    tolerance: f64,
) -> Result<ErrorEstimate> {
    problem.check_buffers(r, u)?;
    if thresholds.len() != problem.number_of_contacts() {
        return Err(Error::dimension(
            "slide thresholds",
            problem.number_of_contacts(),
            thresholds.len(),
        ));
    }
    problem.velocity(r, u)?;
    let d = problem.dimension();
    let mut squared = 0.0;
    let mut p = vec![0.0; d];
    for ((ri, ui), &g) in r.chunks_exact(d).zip(u.chunks_exact(d)).zip(thresholds) {
        for ((pk, rk), uk) in p.iter_mut().zip(ri).zip(ui) {
            *pk = rk - uk;
        }
        project_on_cylinder(&mut p, g);
        squared += p
            .iter()
            .zip(ri)
            .map(|(pk, rk)| (rk - pk) * (rk - pk))
            .sum::<f64>();
    }
    Ok(ErrorEstimate::new(
        relative(squared.sqrt(), norm2(problem.q())),
        tolerance,
    ))
}

/// Run the friction-contact solver selected by `options`.
pub fn solve(
    problem: &FrictionContactProblem,
    reaction: &mut [f64],
    velocity: &mut [f64],
    options: &SolverOptions,
) -> Result<SolverOutcome> {
    match options {
        SolverOptions::Nsgs(o) => nsgs(problem, reaction, velocity, o),
        SolverOptions::TrescaFixedPoint(o) => tresca_fixed_point(problem, reaction, velocity, o),
        SolverOptions::Extragradient(o) => extragradient(problem, reaction, velocity, o),
        SolverOptions::FixedPointProjection(o) => {
            fixed_point_projection(problem, reaction, velocity, o)
        }
        other => Err(Error::Configuration(format!(
            "{} is not a friction-contact solver",
            other.name()
        ))),
    }
}
