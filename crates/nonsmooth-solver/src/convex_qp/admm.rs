//! ADMM on the splitting `A x + b = ξ, ξ ∈ C`.

use nalgebra::DMatrix;
use nonsmooth_core::{Error as CoreError, NumericMatrix};

use super::compute_error;
use crate::error::{Error, Result};
use crate::options::{AdmmOptions, InitialRho, RhoStrategy};
use crate::outcome::SolverOutcome;
use crate::problem::ConvexQp;
use crate::vector::{all_finite, distance, norm2};

/// `M + rho AᵀA`, factorized.
fn factorized_system(qp: &ConvexQp<'_>, rho: f64) -> Result<NumericMatrix> {
    let mut k = match qp.constraint() {
        None => {
            let mut k = qp.m().clone();
            k.add_scaled(rho, &NumericMatrix::identity(qp.size()))?;
            k
        }
        Some(c) => {
            let a = c.a.to_dense();
            let ata: DMatrix<f64> = a.transpose() * &a;
            NumericMatrix::dense(qp.m().to_dense() + ata * rho)
        }
    };
    k.factorize()?;
    Ok(k)
}

/// Scaled-form ADMM:
///
/// ```text
/// (M + rho AᵀA) x = -q + rho Aᵀ(ξ - b - u)
/// ξ ← P(A x + b + u)
/// u ← u + A x + b - ξ
/// ```
///
/// `M + rho AᵀA` is factorized once and reused until rho changes. `y` holds
/// the multiplier of the constraint (`rho u`) on entry and exit; `w`
/// receives `M x + q`.
pub fn admm(
    qp: &ConvexQp<'_>,
    x: &mut [f64],
    w: &mut [f64],
    y: &mut [f64],
    options: &AdmmOptions,
) -> Result<SolverOutcome> {
    options.validate()?;
    let n = qp.size();
    let m = qp.constraint_size();
    if x.len() != n {
        return Err(Error::dimension("QP solution x", n, x.len()));
    }
    if w.len() != n {
        return Err(Error::dimension("QP gradient w", n, w.len()));
    }
    if y.len() != m {
        return Err(Error::dimension("QP multiplier", m, y.len()));
    }

    let mut rho = match options.initial_rho {
        InitialRho::Given => options.rho,
        InitialRho::NormInf => {
            let norm = qp.m().norm_inf();
            if norm > 0.0 { norm } else { options.rho }
        }
    };
    log::debug!("admm: size {n}, constraint size {m}, rho {rho:e}");

    let mut k = match factorized_system(qp, rho) {
        Ok(k) => k,
        Err(Error::Core(CoreError::SingularMatrix { pivot })) => {
            let outcome = SolverOutcome::breakdown(
                0,
                f64::INFINITY,
                format!("singular ADMM system at pivot {pivot}"),
            );
            outcome.log("admm");
            return Ok(outcome);
        }
        Err(e) => return Err(e),
    };

    let b: Vec<f64> = qp
        .constraint()
        .map_or_else(|| vec![0.0; m], |c| c.b.clone());
    let mut xi = vec![0.0; m];
    qp.constraint_value(x, &mut xi)?;
    qp.project(&mut xi);
    let mut u: Vec<f64> = y.iter().map(|v| v / rho).collect();

    let mut last_x = x.to_vec();
    let mut xi_old = vec![0.0; m];
    let mut v = vec![0.0; m];
    let mut rhs_m = vec![0.0; m];
    let mut rhs = vec![0.0; n];
    let mut ds = vec![0.0; n];
    let mut multiplier = y.to_vec();
    let mut error = f64::INFINITY;
    let mut outcome = None;

    for iteration in 1..=options.max_iterations {
        // x-update
        for (((r, xi_j), b_j), u_j) in rhs_m.iter_mut().zip(&xi).zip(&b).zip(&u) {
            *r = xi_j - b_j - u_j;
        }
        qp.constraint_transpose(&rhs_m, &mut rhs)?;
        for (r, q) in rhs.iter_mut().zip(qp.q()) {
            *r = rho * *r - q;
        }
        match k.solve_in_place(&mut rhs) {
            Ok(()) => {}
            Err(CoreError::SingularMatrix { pivot }) => {
                outcome = Some(SolverOutcome::breakdown(
                    iteration - 1,
                    error,
                    format!("singular ADMM system at pivot {pivot}"),
                ));
                break;
            }
            Err(e) => return Err(e.into()),
        }
        if !all_finite(&rhs) {
            outcome = Some(SolverOutcome::breakdown(
                iteration - 1,
                error,
                "non-finite iterate",
            ));
            break;
        }
        x.copy_from_slice(&rhs);

        // ξ- and u-updates
        qp.constraint_value(x, &mut v)?;
        xi_old.copy_from_slice(&xi);
        for ((xi_j, v_j), u_j) in xi.iter_mut().zip(&v).zip(&u) {
            *xi_j = v_j + u_j;
        }
        qp.project(&mut xi);
        for ((u_j, v_j), xi_j) in u.iter_mut().zip(&v).zip(&xi) {
            *u_j += v_j - xi_j;
        }

        let primal = distance(&v, &xi);
        for ((d, a), b) in rhs_m.iter_mut().zip(&xi).zip(&xi_old) {
            *d = rho * (a - b);
        }
        qp.constraint_transpose(&rhs_m, &mut ds)?;
        let dual = norm2(&ds);

        for (yj, uj) in multiplier.iter_mut().zip(&u) {
            *yj = rho * uj;
        }
        error = compute_error(qp, x, &multiplier, w, options.tolerance)?.error;
        last_x.copy_from_slice(x);
        log::trace!(
            "admm: iteration {iteration}, error {error:e}, primal {primal:e}, dual {dual:e}, rho {rho:e}"
        );
        if error <= options.tolerance {
            outcome = Some(SolverOutcome::converged(iteration, error));
            break;
        }

        if let RhoStrategy::ResidualBalancing { mu, factor } = options.rho_strategy {
            let scale = if primal > mu * dual {
                factor
            } else if dual > mu * primal {
                1.0 / factor
            } else {
                1.0
            };
            if scale != 1.0 {
                rho *= scale;
                u.iter_mut().for_each(|u_j| *u_j /= scale);
                log::trace!("admm: rho updated to {rho:e}");
                match factorized_system(qp, rho) {
                    Ok(refactored) => k = refactored,
                    Err(Error::Core(CoreError::SingularMatrix { pivot })) => {
                        outcome = Some(SolverOutcome::breakdown(
                            iteration,
                            error,
                            format!("singular ADMM system at pivot {pivot}"),
                        ));
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }

    x.copy_from_slice(&last_x);
    qp.gradient(x, w)?;
    y.copy_from_slice(&multiplier);
    let outcome =
        outcome.unwrap_or_else(|| SolverOutcome::iteration_limit(options.max_iterations, error));
    outcome.log("admm");
    Ok(outcome)
}
