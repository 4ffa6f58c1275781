//! One-contact solvers used inside Gauss-Seidel sweeps.

use nalgebra::{DMatrix, DVector};

use super::{de_saxce, local_error};
use crate::options::{LocalSolverKind, LocalSolverOptions};
use crate::problem::LocalContactProblem;
use crate::projection::project_on_cone;
use crate::vector::{axpy, distance, dot};

// Self-adaptive step control of the local iteration.
const TAU: f64 = 2.0 / 3.0;
const TAUINV: f64 = 3.0 / 2.0;
const L: f64 = 0.9;
const LMIN: f64 = 0.3;
const MAX_LINE_SEARCH: usize = 20;

// Armijo backtracking of the local Newton method.
const NEWTON_SIGMA: f64 = 1e-4;
const NEWTON_MAX_BACKTRACKS: usize = 20;

/// Result of a local solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalSolve {
    pub iterations: usize,
    /// Local error `‖r - P_K(r - û)‖` at exit.
    pub error: f64,
}

/// Trivial take-off detection: `r = 0` solves the contact exactly when
/// `q_n >= 0`. Sets `r` to zero in that case.
pub fn take_off(local: &LocalContactProblem, r: &mut [f64]) -> bool {
    if local.q[0] >= 0.0 {
        r.iter_mut().for_each(|v| *v = 0.0);
        true
    } else {
        false
    }
}

/// `û = W r + q + (mu ‖u_t‖, 0, ..)`.
fn modified_velocity(local: &LocalContactProblem, r: &[f64], u: &mut [f64]) {
    local.velocity(r, u);
    de_saxce(u, local.mu);
}

fn initial_rho(local: &LocalContactProblem) -> f64 {
    let wnn = local.w[(0, 0)];
    if wnn.is_finite() && wnn > 0.0 {
        1.0 / wnn
    } else {
        log::trace!("local solver: non-positive W_nn = {wnn:e}, using rho = 1");
        1.0
    }
}

/// Solve one contact in place, starting from `r`.
pub fn solve_contact(
    local: &LocalContactProblem,
    r: &mut [f64],
    options: &LocalSolverOptions,
    tolerance: f64,
) -> LocalSolve {
    match options.kind {
        LocalSolverKind::ProjectionOnCone => projection_on_cone(local, r),
        LocalSolverKind::ProjectionOnConeWithLocalIteration => {
            projection_on_cone_with_local_iteration(local, r, options.max_iterations, tolerance)
        }
        LocalSolverKind::NonsmoothNewton => {
            nonsmooth_newton_with_fallback(local, r, options.max_iterations, tolerance)
        }
    }
}

/// One projected step `r ← P_K(r - û / W_nn)`.
fn projection_on_cone(local: &LocalContactProblem, r: &mut [f64]) -> LocalSolve {
    let d = local.dimension();
    let mut u = vec![0.0; d];
    modified_velocity(local, r, &mut u);
    let rho = initial_rho(local);
    axpy(-rho, &u, r);
    project_on_cone(r, local.mu);
    local.velocity(r, &mut u);
    LocalSolve {
        iterations: 1,
        error: local_error(r, &u, local.mu),
    }
}

/// Projected steps with a self-adaptive `rho` until the local error drops
/// below `tolerance`.
fn projection_on_cone_with_local_iteration(
    local: &LocalContactProblem,
    r: &mut [f64],
    max_iterations: usize,
    tolerance: f64,
) -> LocalSolve {
    let d = local.dimension();
    let mut rho = initial_rho(local);
    let mut u = vec![0.0; d];
    let mut u_trial = vec![0.0; d];
    let mut trial = vec![0.0; d];

    local.velocity(r, &mut u);
    let mut error = local_error(r, &u, local.mu);
    let mut iterations = 0;
    while iterations < max_iterations && error > tolerance {
        iterations += 1;
        modified_velocity(local, r, &mut u);
        let (mut a1, mut a2) = (0.0, 0.0);
        for _ in 0..MAX_LINE_SEARCH {
            for ((t, ri), ui) in trial.iter_mut().zip(r.iter()).zip(&u) {
                *t = ri - rho * ui;
            }
            project_on_cone(&mut trial, local.mu);
            modified_velocity(local, &trial, &mut u_trial);
            a1 = distance(&u, &u_trial);
            a2 = distance(r, &trial);
            if rho * a1 <= L * a2 {
                break;
            }
            rho *= TAU;
        }
        r.copy_from_slice(&trial);
        if rho * a1 < LMIN * a2 {
            rho *= TAUINV;
        }
        local.velocity(r, &mut u);
        error = local_error(r, &u, local.mu);
    }
    LocalSolve { iterations, error }
}

/// Kronecker delta.
fn delta(i: usize, j: usize) -> f64 {
    if i == j { 1.0 } else { 0.0 }
}

/// Alart-Curnier function `Φ(r) = r - P(r - ρ u)` with `u = W r + q`.
///
/// The normal part is projected on `R+` and the tangential part on the disc
/// of radius `mu max(0, r_n - ρ u_n)`. When `jacobian` is given it receives
/// an element of the generalized Jacobian `∂Φ/∂r`.
fn alart_curnier(
    local: &LocalContactProblem,
    r: &[f64],
    rho: f64,
    phi: &mut [f64],
    jacobian: Option<&mut DMatrix<f64>>,
) {
    let d = local.dimension();
    let w = &local.w;
    let mut u = vec![0.0; d];
    local.velocity(r, &mut u);

    let normal = r[0] - rho * u[0];
    let active = normal > 0.0;
    let radius = local.mu * normal.max(0.0);
    phi[0] = r[0] - normal.max(0.0);

    let t: Vec<f64> = (1..d).map(|i| r[i] - rho * u[i]).collect();
    let norm_t = dot(&t, &t).sqrt();
    let sticking = norm_t <= radius;
    for i in 1..d {
        phi[i] = if sticking {
            rho * u[i]
        } else {
            r[i] - radius * t[i - 1] / norm_t
        };
    }

    let Some(jac) = jacobian else { return };
    // ∂(r - ρ u)_k / ∂r_j
    let shifted = |k: usize, j: usize| delta(k, j) - rho * w[(k, j)];
    for j in 0..d {
        jac[(0, j)] = if active { rho * w[(0, j)] } else { delta(0, j) };
    }
    for i in 1..d {
        for j in 0..d {
            jac[(i, j)] = if sticking {
                rho * w[(i, j)]
            } else {
                let e_i = t[i - 1] / norm_t;
                let projected: f64 = (1..d)
                    .map(|k| {
                        let e_k = t[k - 1] / norm_t;
                        (delta(i, k) - e_i * e_k) * shifted(k, j)
                    })
                    .sum();
                let slope = if active { local.mu * shifted(0, j) } else { 0.0 };
                delta(i, j) - radius / norm_t * projected - e_i * slope
            };
        }
    }
}

/// `ρ = 1 / ‖W‖₂`, or the projection step when `W` has no usable norm.
fn newton_rho(local: &LocalContactProblem) -> f64 {
    let norm = local.w.singular_values().max();
    if norm.is_finite() && norm > 0.0 {
        1.0 / norm
    } else {
        initial_rho(local)
    }
}

/// Semismooth Newton on the Alart-Curnier function with Armijo
/// backtracking on `½‖Φ‖²`. Stops early on a singular Jacobian or a failed
/// line search.
fn nonsmooth_newton(
    local: &LocalContactProblem,
    r: &mut [f64],
    max_iterations: usize,
    tolerance: f64,
) -> LocalSolve {
    let d = local.dimension();
    let rho = newton_rho(local);
    let mut u = vec![0.0; d];
    let mut phi = vec![0.0; d];
    let mut phi_trial = vec![0.0; d];
    let mut trial = vec![0.0; d];
    let mut jacobian = DMatrix::zeros(d, d);

    local.velocity(r, &mut u);
    let mut error = local_error(r, &u, local.mu);
    let mut iterations = 0;
    while iterations < max_iterations && error > tolerance {
        iterations += 1;
        alart_curnier(local, r, rho, &mut phi, Some(&mut jacobian));
        let rhs = DVector::from_iterator(d, phi.iter().map(|p| -p));
        let Some(step) = jacobian.clone().lu().solve(&rhs) else {
            log::trace!("local newton: singular jacobian at iteration {iterations}");
            break;
        };

        // Along the Newton direction the slope of ½‖Φ‖² is -‖Φ‖².
        let merit = 0.5 * dot(&phi, &phi);
        let mut t = 1.0;
        let mut accepted = false;
        for _ in 0..=NEWTON_MAX_BACKTRACKS {
            for ((x, ri), di) in trial.iter_mut().zip(r.iter()).zip(step.iter()) {
                *x = ri + t * di;
            }
            alart_curnier(local, &trial, rho, &mut phi_trial, None);
            let merit_trial = 0.5 * dot(&phi_trial, &phi_trial);
            if merit_trial.is_finite() && merit_trial <= (1.0 - 2.0 * NEWTON_SIGMA * t) * merit {
                accepted = true;
                break;
            }
            t *= 0.5;
        }
        if !accepted {
            log::trace!("local newton: line search failed at iteration {iterations}");
            break;
        }

        r.copy_from_slice(&trial);
        local.velocity(r, &mut u);
        error = local_error(r, &u, local.mu);
    }
    LocalSolve { iterations, error }
}

/// Keep `r` when its error does not exceed `best`, otherwise restore
/// `backup`.
fn keep_or_restore(local: &LocalContactProblem, r: &mut [f64], backup: &mut [f64], best: &mut f64) {
    let mut u = vec![0.0; r.len()];
    local.velocity(r, &mut u);
    let error = local_error(r, &u, local.mu);
    if error.is_finite() && error <= *best {
        *best = error;
        backup.copy_from_slice(r);
    } else {
        r.copy_from_slice(backup);
    }
}

/// Newton first; if it stalls, projected iterations from the best point so
/// far and one more Newton pass. Never returns a point worse than the start.
fn nonsmooth_newton_with_fallback(
    local: &LocalContactProblem,
    r: &mut [f64],
    max_iterations: usize,
    tolerance: f64,
) -> LocalSolve {
    let mut backup = r.to_vec();
    let mut u = vec![0.0; r.len()];
    local.velocity(r, &mut u);
    let mut best = local_error(r, &u, local.mu);
    if !best.is_finite() {
        best = f64::INFINITY;
    }

    let mut iterations = nonsmooth_newton(local, r, max_iterations, tolerance).iterations;
    keep_or_restore(local, r, &mut backup, &mut best);
    if best <= tolerance {
        return LocalSolve { iterations, error: best };
    }

    iterations += projection_on_cone_with_local_iteration(local, r, max_iterations, tolerance).iterations;
    keep_or_restore(local, r, &mut backup, &mut best);
    if best <= tolerance {
        return LocalSolve { iterations, error: best };
    }

    iterations += nonsmooth_newton(local, r, max_iterations, tolerance).iterations;
    keep_or_restore(local, r, &mut backup, &mut best);
    LocalSolve { iterations, error: best }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, dmatrix};

    fn local(w: DMatrix<f64>, q: Vec<f64>, mu: f64) -> LocalContactProblem {
        LocalContactProblem { w, q, mu }
    }

    fn iterated() -> LocalSolverOptions {
        LocalSolverOptions {
            kind: LocalSolverKind::ProjectionOnConeWithLocalIteration,
            max_iterations: 1000,
            tolerance: 1e-12,
        }
    }

    #[test]
    fn test_take_off() {
        let problem = local(DMatrix::identity(3, 3), vec![0.5, 1.0, -2.0], 0.3);
        let mut r = [1.0, 2.0, 3.0];
        assert!(take_off(&problem, &mut r));
        assert_eq!(r, [0.0; 3]);

        let problem = local(DMatrix::identity(3, 3), vec![-0.5, 1.0, -2.0], 0.3);
        assert!(!take_off(&problem, &mut r));
    }

    #[test]
    fn test_sticking_contact() {
        // Unconstrained solution r = -q lies inside the cone.
        let problem = local(DMatrix::identity(3, 3), vec![-1.0, 0.2, 0.0], 0.5);
        let mut r = [0.0; 3];
        let result = solve_contact(&problem, &mut r, &iterated(), 1e-12);
        assert!(result.error <= 1e-12);
        assert!((r[0] - 1.0).abs() < 1e-10 && (r[1] + 0.2).abs() < 1e-10);
    }

    #[test]
    fn test_sliding_contact() {
        let problem = local(DMatrix::identity(3, 3), vec![-1.0, 1.0, 0.0], 0.5);
        let mut r = [0.0; 3];
        let result = solve_contact(&problem, &mut r, &iterated(), 1e-12);
        assert!(result.error <= 1e-12, "{result:?}");
        assert!((r[0] - 1.0).abs() < 1e-10);
        assert!((r[1] + 0.5).abs() < 1e-10);
        assert!(r[2].abs() < 1e-10);
    }

    #[test]
    fn test_coupled_block() {
        let w = dmatrix![2.0, 0.5, 0.0; 0.5, 1.0, 0.1; 0.0, 0.1, 1.0];
        let problem = local(w, vec![-1.0, 0.8, -0.3], 0.4);
        let mut r = [0.0; 3];
        let result = solve_contact(&problem, &mut r, &iterated(), 1e-11);
        assert!(result.error <= 1e-11, "{result:?}");
        let mut u = [0.0; 3];
        problem.velocity(&r, &mut u);
        assert!(local_error(&r, &u, 0.4) <= 1e-11);
    }

    fn newton() -> LocalSolverOptions {
        LocalSolverOptions {
            kind: LocalSolverKind::NonsmoothNewton,
            max_iterations: 1000,
            tolerance: 1e-12,
        }
    }

    #[test]
    fn test_alart_curnier_vanishes_at_solution() {
        // Sliding solution of the identity problem: r = (1, -0.5, 0), u = (0, 0.5, 0).
        let problem = local(DMatrix::identity(3, 3), vec![-1.0, 1.0, 0.0], 0.5);
        let mut phi = [0.0; 3];
        let mut jacobian = DMatrix::zeros(3, 3);
        alart_curnier(&problem, &[1.0, -0.5, 0.0], 1.0, &mut phi, Some(&mut jacobian));
        assert!(phi.iter().all(|p| p.abs() < 1e-14), "{phi:?}");
        assert!(jacobian.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_alart_curnier_jacobian_matches_differences() {
        let w = dmatrix![2.0, 0.5, 0.0; 0.5, 1.0, 0.1; 0.0, 0.1, 1.0];
        let problem = local(w, vec![-1.0, 0.8, -0.3], 0.4);
        let r = [0.7, -0.1, 0.05];
        let rho = 0.6;
        let mut phi = [0.0; 3];
        let mut jacobian = DMatrix::zeros(3, 3);
        alart_curnier(&problem, &r, rho, &mut phi, Some(&mut jacobian));

        let h = 1e-7;
        for j in 0..3 {
            let mut shifted = r;
            shifted[j] += h;
            let mut phi_h = [0.0; 3];
            alart_curnier(&problem, &shifted, rho, &mut phi_h, None);
            for i in 0..3 {
                let fd = (phi_h[i] - phi[i]) / h;
                assert!((fd - jacobian[(i, j)]).abs() < 1e-5, "({i}, {j}): {fd} vs {}", jacobian[(i, j)]);
            }
        }
    }

    #[test]
    fn test_newton_sliding_contact() {
        let problem = local(DMatrix::identity(3, 3), vec![-1.0, 1.0, 0.0], 0.5);
        let mut r = [0.0; 3];
        let result = solve_contact(&problem, &mut r, &newton(), 1e-12);
        assert!(result.error <= 1e-12, "{result:?}");
        assert!((r[0] - 1.0).abs() < 1e-10);
        assert!((r[1] + 0.5).abs() < 1e-10);
        assert!(r[2].abs() < 1e-10);
    }

    #[test]
    fn test_newton_coupled_block() {
        let w = dmatrix![2.0, 0.5, 0.0; 0.5, 1.0, 0.1; 0.0, 0.1, 1.0];
        let problem = local(w, vec![-1.0, 0.8, -0.3], 0.4);
        let mut r = [0.0; 3];
        let result = solve_contact(&problem, &mut r, &newton(), 1e-11);
        assert!(result.error <= 1e-11, "{result:?}");
        let mut u = [0.0; 3];
        problem.velocity(&r, &mut u);
        assert!(local_error(&r, &u, 0.4) <= 1e-11);
    }

    #[test]
    fn test_newton_two_dimensional_sticking() {
        let problem = local(dmatrix![1.0, 0.2; 0.2, 1.0], vec![-1.0, 0.1], 0.8);
        let mut r = [0.0; 2];
        let result = solve_contact(&problem, &mut r, &newton(), 1e-12);
        assert!(result.error <= 1e-12, "{result:?}");
        let mut u = [0.0; 2];
        problem.velocity(&r, &mut u);
        // Sticking: zero relative velocity, reaction strictly inside the cone.
        assert!(u[0].abs() < 1e-10 && u[1].abs() < 1e-10);
        assert!(r[1].abs() < 0.8 * r[0]);
    }

    #[test]
    fn test_newton_never_worsens_start() {
        // Singular W: Newton cannot make progress from r = 0 along the tangent.
        let problem = local(DMatrix::zeros(3, 3), vec![-1.0, 0.5, 0.0], 0.3);
        let mut r = [0.0; 3];
        let mut u = [0.0; 3];
        problem.velocity(&r, &mut u);
        let start = local_error(&r, &u, 0.3);
        let result = solve_contact(&problem, &mut r, &newton(), 1e-12);
        assert!(result.error <= start);
        assert!(r.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_single_projection_step() {
        let problem = local(DMatrix::identity(2, 2), vec![-1.0, 0.2], 0.5);
        let mut r = [0.0; 2];
        let options = LocalSolverOptions {
            kind: LocalSolverKind::ProjectionOnCone,
            ..iterated()
        };
        let result = solve_contact(&problem, &mut r, &options, 1e-12);
        assert_eq!(result.iterations, 1);
        // From r = 0: û = (-1 + 0.1, 0.2), one step lands on the cone.
        assert!(r[0] > 0.0 && r[1].abs() <= 0.5 * r[0] + 1e-15);
    }
}
