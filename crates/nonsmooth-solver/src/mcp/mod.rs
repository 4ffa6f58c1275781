//! Mixed complementarity: Fischer-Burmeister semismooth Newton.
//!
//! The MCP is recast as the square nonsmooth system `Φ(z) = 0` with
//! `Φ_e = F_e` on the equality block and
//! `Φ_i = φ(z_i, F_i) = √(z_i² + F_i²) - z_i - F_i` on the complementarity
//! block. Newton directions solve `H d = -Φ` for an element `H` of the
//! generalized Jacobian, globalized by an Armijo search on
//! `ψ = ½‖Φ‖²`.

use nalgebra::DMatrix;
use nonsmooth_core::{Error as CoreError, NumericMatrix};

use crate::error::{Error, Result};
use crate::options::NewtonOptions;
use crate::outcome::{ErrorEstimate, SolverOutcome};
use crate::problem::MixedComplementarityProblem;
use crate::vector::{all_finite, dot, norm2};

/// `sqrt(‖w_e‖² + ‖z_i - max(0, z_i - w_i)‖²)` with `w = F(z)` written
/// into `w`. The measure is absolute.
pub fn compute_error(
    problem: &MixedComplementarityProblem<'_>,
    z: &[f64],
    w: &mut [f64],
    tolerance: f64,
) -> Result<ErrorEstimate> {
    problem.evaluate(z, w)?;
    Ok(ErrorEstimate::new(
        error_of(problem.n_equalities(), z, w),
        tolerance,
    ))
}

fn error_of(n_equalities: usize, z: &[f64], w: &[f64]) -> f64 {
    let mut sum = 0.0;
    for (i, (zi, wi)) in z.iter().zip(w).enumerate() {
        let d = if i < n_equalities {
            *wi
        } else {
            zi - (zi - wi).max(0.0)
        };
        sum += d * d;
    }
    sum.sqrt()
}

fn fischer_burmeister(n_equalities: usize, z: &[f64], f: &[f64], phi: &mut [f64]) {
    for (i, p) in phi.iter_mut().enumerate() {
        *p = if i < n_equalities {
            f[i]
        } else {
            (z[i] * z[i] + f[i] * f[i]).sqrt() - z[i] - f[i]
        };
    }
}

/// Element of the generalized Jacobian of `Φ` at `z`, given `J = ∇F(z)`.
///
/// Rows where `z_i = F_i = 0` take the directional choice
/// `(1/√2 - 1, 1/√2 - 1)`.
fn fischer_burmeister_jacobian(
    n_equalities: usize,
    z: &[f64],
    f: &[f64],
    jac: &DMatrix<f64>,
    h: &mut DMatrix<f64>,
) {
    h.copy_from(jac);
    for i in n_equalities..z.len() {
        let r = (z[i] * z[i] + f[i] * f[i]).sqrt();
        let (da, db) = if r > 0.0 {
            (z[i] / r - 1.0, f[i] / r - 1.0)
        } else {
            let c = std::f64::consts::FRAC_1_SQRT_2 - 1.0;
            (c, c)
        };
        for j in 0..z.len() {
            h[(i, j)] *= db;
        }
        h[(i, i)] += da;
    }
}

fn merit(phi: &[f64]) -> f64 {
    0.5 * dot(phi, phi)
}

/// Semismooth Newton on the Fischer-Burmeister reformulation.
///
/// Falls back to the steepest descent direction of `ψ` when the Newton
/// system is singular or its solution is not a descent direction. `w`
/// receives `F(z)`.
pub fn newton_fb(
    problem: &MixedComplementarityProblem<'_>,
    z: &mut [f64],
    w: &mut [f64],
    options: &NewtonOptions,
) -> Result<SolverOutcome> {
    options.validate()?;
    let n = problem.size();
    if z.len() != n {
        return Err(Error::dimension("MCP solution z", n, z.len()));
    }
    if w.len() != n {
        return Err(Error::dimension("MCP value w", n, w.len()));
    }
    let ne = problem.n_equalities();
    log::debug!(
        "newton fb: {ne} equalities, {} complementarity rows",
        problem.n_complementarity()
    );

    let mut jac = DMatrix::zeros(n, n);
    let mut h = DMatrix::zeros(n, n);
    let mut phi = vec![0.0; n];
    let mut grad = vec![0.0; n];
    let mut d = vec![0.0; n];
    let mut trial = vec![0.0; n];
    let mut f_trial = vec![0.0; n];
    let mut phi_trial = vec![0.0; n];

    problem.evaluate(z, w)?;
    if !all_finite(z) || !all_finite(w) {
        let outcome = SolverOutcome::breakdown(0, f64::INFINITY, "non-finite starting point");
        outcome.log("newton fb");
        return Ok(outcome);
    }
    fischer_burmeister(ne, z, w, &mut phi);
    let mut psi = merit(&phi);
    let mut error = error_of(ne, z, w);
    if error <= options.tolerance {
        let outcome = SolverOutcome::converged(0, error);
        outcome.log("newton fb");
        return Ok(outcome);
    }

    let mut outcome = None;
    for iteration in 1..=options.max_iterations {
        problem.jacobian(z, &mut jac)?;
        fischer_burmeister_jacobian(ne, z, w, &jac, &mut h);
        let gradient = h.transpose() * nalgebra::DVector::from_column_slice(&phi);
        grad.copy_from_slice(gradient.as_slice());

        for (di, pi) in d.iter_mut().zip(&phi) {
            *di = -pi;
        }
        let mut system = NumericMatrix::dense(h.clone());
        let newton_ok = match system.solve_in_place(&mut d) {
            Ok(()) => all_finite(&d) && dot(&grad, &d) < -1e-12 * norm2(&grad) * norm2(&d),
            Err(CoreError::SingularMatrix { .. }) => false,
            Err(e) => return Err(e.into()),
        };
        if !newton_ok {
            log::trace!("newton fb: iteration {iteration}, gradient direction");
            for (di, gi) in d.iter_mut().zip(&grad) {
                *di = -gi;
            }
        }
        let slope = dot(&grad, &d);

        // Armijo backtracking.
        let mut t = 1.0;
        let mut accepted = false;
        for _ in 0..=options.max_backtracks {
            for ((x, zi), di) in trial.iter_mut().zip(z.iter()).zip(&d) {
                *x = zi + t * di;
            }
            problem.evaluate(&trial, &mut f_trial)?;
            fischer_burmeister(ne, &trial, &f_trial, &mut phi_trial);
            let psi_trial = merit(&phi_trial);
            if psi_trial.is_finite() && psi_trial <= psi + options.armijo_sigma * t * slope {
                accepted = true;
                psi = psi_trial;
                break;
            }
            t *= options.backtrack_factor;
        }
        if !accepted {
            outcome = Some(SolverOutcome::breakdown(
                iteration - 1,
                error,
                "line search failed",
            ));
            break;
        }

        z.copy_from_slice(&trial);
        w.copy_from_slice(&f_trial);
        phi.copy_from_slice(&phi_trial);
        error = error_of(ne, z, w);
        log::trace!("newton fb: iteration {iteration}, error {error:e}, step {t:e}");
        if error <= options.tolerance {
            outcome = Some(SolverOutcome::converged(iteration, error));
            break;
        }
    }

    let outcome =
        outcome.unwrap_or_else(|| SolverOutcome::iteration_limit(options.max_iterations, error));
    outcome.log("newton fb");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::SolverStatus;

    /// One equality `z0 + z1 - 2 = 0` and one complementarity row
    /// `0 <= z1 ⟂ z1 - z0 + 1 >= 0`. `z1 = 0` would give `F1 = -1`, so the
    /// row is active and `z = (1.5, 0.5)`.
    fn mixed<'a>() -> MixedComplementarityProblem<'a> {
        MixedComplementarityProblem::new(
            1,
            1,
            |z: &[f64], f: &mut [f64]| {
                f[0] = z[0] + z[1] - 2.0;
                f[1] = z[1] - z[0] + 1.0;
                Ok(())
            },
            |_: &[f64], j: &mut DMatrix<f64>| {
                j.copy_from_slice(&[1.0, -1.0, 1.0, 1.0]);
                Ok(())
            },
        )
        .unwrap()
    }

    #[test]
    fn test_mixed_problem() {
        let mcp = mixed();
        let mut z = [0.0; 2];
        let mut w = [0.0; 2];
        let outcome = newton_fb(&mcp, &mut z, &mut w, &Default::default()).unwrap();
        assert!(outcome.is_converged(), "{outcome:?}");
        assert!((z[0] - 1.5).abs() < 1e-9 && (z[1] - 0.5).abs() < 1e-9);
        assert!(compute_error(&mcp, &z, &mut w, 1e-9).unwrap().converged);
    }

    #[test]
    fn test_nonlinear_complementarity() {
        // F(z) = z² - 4 on the non-negative half line: z = 2.
        let ncp = MixedComplementarityProblem::new(
            0,
            1,
            |z: &[f64], f: &mut [f64]| {
                f[0] = z[0] * z[0] - 4.0;
                Ok(())
            },
            |z: &[f64], j: &mut DMatrix<f64>| {
                j[(0, 0)] = 2.0 * z[0];
                Ok(())
            },
        )
        .unwrap();
        let mut z = [1.0];
        let mut w = [0.0];
        let outcome = newton_fb(&ncp, &mut z, &mut w, &Default::default()).unwrap();
        assert!(outcome.is_converged(), "{outcome:?}");
        assert!((z[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_inactive_bound() {
        // F(z) = z + 1 > 0 everywhere on z >= 0: z = 0.
        let ncp = MixedComplementarityProblem::new(
            0,
            1,
            |z: &[f64], f: &mut [f64]| {
                f[0] = z[0] + 1.0;
                Ok(())
            },
            |_: &[f64], j: &mut DMatrix<f64>| {
                j[(0, 0)] = 1.0;
                Ok(())
            },
        )
        .unwrap();
        let mut z = [3.0];
        let mut w = [0.0];
        let outcome = newton_fb(&ncp, &mut z, &mut w, &Default::default()).unwrap();
        assert!(outcome.is_converged(), "{outcome:?}");
        assert!(z[0].abs() < 1e-9);
        assert!((w[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_error_measure() {
        let mcp = mixed();
        let mut w = [0.0; 2];
        // F = (0, 1): equality satisfied, complementarity off by 1.
        let estimate = compute_error(&mcp, &[1.0, 1.0], &mut w, 1e-8).unwrap();
        assert!((estimate.error - 1.0).abs() < 1e-15);
        assert!(!estimate.converged);
    }

    #[test]
    fn test_nan_start_is_breakdown() {
        let mcp = mixed();
        let mut z = [f64::NAN, 0.0];
        let mut w = [0.0; 2];
        let outcome = newton_fb(&mcp, &mut z, &mut w, &Default::default()).unwrap();
        assert!(matches!(outcome.status, SolverStatus::NumericalBreakdown(_)));
    }
}
