//! Complementary pivoting with a lexicographic ratio test.

use std::cmp::Ordering;

use nalgebra::DMatrix;

use super::compute_error;
use crate::error::Result;
use crate::options::LemkeOptions;
use crate::outcome::SolverOutcome;
use crate::problem::LinearComplementarityProblem;

/// Gauss-Jordan pivot of the tableau on `(row, col)`.
fn pivot(t: &mut DMatrix<f64>, row: usize, col: usize) {
    let p = t[(row, col)];
    let mut pivot_row = t.row(row).into_owned();
    pivot_row /= p;
    t.set_row(row, &pivot_row);
    for i in 0..t.nrows() {
        if i == row {
            continue;
        }
        let f = t[(i, col)];
        if f != 0.0 {
            for j in 0..t.ncols() {
                t[(i, j)] -= f * pivot_row[j];
            }
        }
    }
}

/// Leaving row for `entering`: minimum ratio `rhs_i / t_ie` over rows with
/// `t_ie > tol`, ties broken lexicographically on the rows of `B⁻¹`, which
/// keeps degenerate problems from cycling.
fn ratio_test(t: &DMatrix<f64>, entering: usize, rhs: usize, n: usize, tol: f64) -> Option<usize> {
    let key = |i: usize, k: usize| -> f64 {
        let col = if k == 0 { rhs } else { k - 1 };
        t[(i, col)] / t[(i, entering)]
    };
    let compare = |a: usize, b: usize| -> Ordering {
        for k in 0..=n {
            let (ka, kb) = (key(a, k), key(b, k));
            let scale = ka.abs().max(kb.abs()).max(1.0);
            if (ka - kb).abs() > tol * scale {
                return ka.partial_cmp(&kb).unwrap_or(Ordering::Equal);
            }
        }
        Ordering::Equal
    };
    (0..t.nrows())
        .filter(|&i| t[(i, entering)] > tol)
        .min_by(|&a, &b| compare(a, b))
}

/// Lemke's method with covering vector `e = (1, ..., 1)`.
///
/// Tableau columns are `[w | z | z0 | rhs]` for `w - M z - e z0 = q`. The
/// algorithm ends when the artificial variable `z0` leaves the basis, on a
/// secondary ray (reported as a breakdown: the LCP may have no solution), or
/// when the pivot budget runs out.
pub fn lemke(
    problem: &LinearComplementarityProblem,
    z: &mut [f64],
    w: &mut [f64],
    options: &LemkeOptions,
) -> Result<SolverOutcome> {
    options.validate()?;
    problem.check_buffers(z, w)?;
    let n = problem.size();
    let q = problem.q();
    log::debug!("lemke: LCP of size {n}");

    if q.iter().all(|&v| v >= 0.0) {
        z.iter_mut().for_each(|v| *v = 0.0);
        let estimate = compute_error(problem, z, w, options.tolerance)?;
        let outcome = SolverOutcome::from_error(0, estimate.error, options.tolerance);
        outcome.log("lemke");
        return Ok(outcome);
    }

    let m = problem.m().to_dense();
    let z0 = 2 * n;
    let rhs = 2 * n + 1;
    let mut t = DMatrix::zeros(n, 2 * n + 2);
    for i in 0..n {
        t[(i, i)] = 1.0;
        for j in 0..n {
            t[(i, n + j)] = -m[(i, j)];
        }
        t[(i, z0)] = -1.0;
        t[(i, rhs)] = q[i];
    }
    let mut basis: Vec<usize> = (0..n).collect();

    // z0 enters at the most negative q.
    let mut row = 0;
    for i in 1..n {
        if q[i] < q[row] {
            row = i;
        }
    }
    pivot(&mut t, row, z0);
    let mut leaving = basis[row];
    basis[row] = z0;
    let mut pivots = 1;

    let mut status = None;
    while leaving != z0 {
        if pivots >= options.max_pivots {
            status = Some(SolverOutcome::iteration_limit(pivots, f64::INFINITY));
            break;
        }
        let entering = if leaving < n { leaving + n } else { leaving - n };
        let Some(r) = ratio_test(&t, entering, rhs, n, options.pivot_tolerance) else {
            status = Some(SolverOutcome::breakdown(
                pivots,
                f64::INFINITY,
                "secondary ray: no blocking variable",
            ));
            break;
        };
        pivot(&mut t, r, entering);
        leaving = basis[r];
        basis[r] = entering;
        pivots += 1;
        log::trace!("lemke: pivot {pivots}, variable {entering} enters, {leaving} leaves");
    }

    z.iter_mut().for_each(|v| *v = 0.0);
    for (i, &var) in basis.iter().enumerate() {
        if (n..2 * n).contains(&var) {
            z[var - n] = t[(i, rhs)];
        }
    }
    if z.iter().any(|v| !v.is_finite()) {
        z.iter_mut().for_each(|v| *v = 0.0);
        let estimate = compute_error(problem, z, w, options.tolerance)?;
        let outcome = SolverOutcome::breakdown(pivots, estimate.error, "non-finite tableau");
        outcome.log("lemke");
        return Ok(outcome);
    }
    let estimate = compute_error(problem, z, w, options.tolerance)?;
    let outcome = match status {
        Some(mut s) => {
            s.error = estimate.error;
            s
        }
        None => SolverOutcome::from_error(pivots, estimate.error, options.tolerance),
    };
    outcome.log("lemke");
    Ok(outcome)
}
