//! Projected Gauss-Seidel with optional over-relaxation.

use super::compute_error;
use crate::error::Result;
use crate::options::PgsOptions;
use crate::outcome::SolverOutcome;
use crate::problem::LinearComplementarityProblem;

/// `z_i ← max(0, z_i - ω (M_i z + q_i) / M_ii)` row by row, using the
/// freshest values of the previous rows.
///
/// A non-positive diagonal entry stops the run before the first sweep.
pub fn pgs(
    problem: &LinearComplementarityProblem,
    z: &mut [f64],
    w: &mut [f64],
    options: &PgsOptions,
) -> Result<SolverOutcome> {
    options.validate()?;
    problem.check_buffers(z, w)?;
    let n = problem.size();
    let m = problem.m();
    let q = problem.q();

    let mut diagonal = Vec::with_capacity(n);
    for i in 0..n {
        let d = m.get(i, i)?;
        if d.is_nan() || d <= 0.0 {
            let estimate = compute_error(problem, z, w, options.tolerance)?;
            let outcome = SolverOutcome::breakdown(
                0,
                estimate.error,
                format!("non-positive diagonal entry M[{i}][{i}] = {d:e}"),
            );
            outcome.log("pgs");
            return Ok(outcome);
        }
        diagonal.push(d);
    }
    log::debug!("pgs: LCP of size {n}, relaxation {}", options.relaxation);

    let omega = options.relaxation;
    let mut last = z.to_vec();
    let mut error = f64::INFINITY;
    let mut outcome = None;

    for iteration in 1..=options.max_iterations {
        for i in 0..n {
            let residual = m.row_dot(i, z)? + q[i];
            z[i] = (z[i] - omega * residual / diagonal[i]).max(0.0);
        }
        if z.iter().any(|v| !v.is_finite()) {
            z.copy_from_slice(&last);
            outcome = Some(SolverOutcome::breakdown(
                iteration - 1,
                error,
                "non-finite iterate",
            ));
            break;
        }
        last.copy_from_slice(z);
        error = compute_error(problem, z, w, options.tolerance)?.error;
        log::trace!("pgs: iteration {iteration}, error {error:e}");
        if error <= options.tolerance {
            outcome = Some(SolverOutcome::converged(iteration, error));
            break;
        }
    }

    problem.velocity(z, w)?;
    let outcome =
        outcome.unwrap_or_else(|| SolverOutcome::iteration_limit(options.max_iterations, error));
    outcome.log("pgs");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::SolverStatus;
    use nalgebra::dmatrix;
    use nonsmooth_core::NumericMatrix;

    fn reference() -> LinearComplementarityProblem {
        LinearComplementarityProblem::new(
            NumericMatrix::dense(dmatrix![2.0, 1.0; 1.0, 2.0]),
            vec![-5.0, -6.0],
        )
        .unwrap()
    }

    #[test]
    fn test_pgs_reference() {
        let lcp = reference();
        let mut z = [0.0; 2];
        let mut w = [0.0; 2];
        let options = PgsOptions {
            tolerance: 1e-12,
            ..Default::default()
        };
        let outcome = pgs(&lcp, &mut z, &mut w, &options).unwrap();
        assert!(outcome.is_converged(), "{outcome:?}");
        assert!((z[0] - 4.0 / 3.0).abs() < 1e-10 && (z[1] - 7.0 / 3.0).abs() < 1e-10);
        assert!(w.iter().all(|v| v.abs() < 1e-10));
    }

    #[test]
    fn test_over_relaxation_converges() {
        let lcp = reference();
        let mut z = [0.0; 2];
        let mut w = [0.0; 2];
        let options = PgsOptions {
            tolerance: 1e-12,
            relaxation: 1.3,
            ..Default::default()
        };
        let outcome = pgs(&lcp, &mut z, &mut w, &options).unwrap();
        assert!(outcome.is_converged(), "{outcome:?}");
        assert!((z[1] - 7.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_sparse_block_storage() {
        let dense = dmatrix![4.0, 1.0, 0.0; 1.0, 4.0, 1.0; 0.0, 1.0, 4.0];
        let sbm =
            nonsmooth_core::SparseBlockMatrix::from_dense(&dense, &[1, 2], &[1, 2]).unwrap();
        let q = vec![-1.0, 2.0, -3.0];
        let a = LinearComplementarityProblem::new(NumericMatrix::dense(dense), q.clone()).unwrap();
        let b = LinearComplementarityProblem::new(NumericMatrix::sparse_block(sbm), q).unwrap();
        let options = PgsOptions {
            tolerance: 1e-12,
            ..Default::default()
        };
        let (mut za, mut zb, mut w) = ([0.0; 3], [0.0; 3], [0.0; 3]);
        assert!(pgs(&a, &mut za, &mut w, &options).unwrap().is_converged());
        assert!(pgs(&b, &mut zb, &mut w, &options).unwrap().is_converged());
        for i in 0..3 {
            assert!((za[i] - zb[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_non_positive_diagonal() {
        let lcp = LinearComplementarityProblem::new(
            NumericMatrix::dense(dmatrix![0.0, 1.0; 1.0, 2.0]),
            vec![-1.0, -1.0],
        )
        .unwrap();
        let mut z = [0.0; 2];
        let mut w = [0.0; 2];
        let outcome = pgs(&lcp, &mut z, &mut w, &Default::default()).unwrap();
        assert!(matches!(outcome.status, SolverStatus::NumericalBreakdown(_)));
        assert_eq!(outcome.iterations, 0);
    }

    #[test]
    fn test_iteration_limit() {
        let lcp = reference();
        let mut z = [0.0; 2];
        let mut w = [0.0; 2];
        let options = PgsOptions {
            max_iterations: 1,
            tolerance: 1e-14,
            ..Default::default()
        };
        let outcome = pgs(&lcp, &mut z, &mut w, &options).unwrap();
        assert_eq!(outcome.status, SolverStatus::IterationLimit);
    }
}
