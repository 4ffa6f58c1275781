//! Projection methods for variational inequalities.
//!
//! Both methods share the self-adaptive step of [`StepRule::Adaptive`]: the
//! step `rho` is shrunk by `tau` until
//! `rho ‖F(x) - F(x̄)‖ <= L ‖x - x̄‖` and grown by `tauinv` after a step whose
//! ratio fell below `Lmin`.

use crate::error::{Error, Result};
use crate::options::{ProjectedGradientOptions, StepRule};
use crate::outcome::{ErrorEstimate, SolverOutcome};
use crate::problem::VariationalInequality;
use crate::vector::{all_finite, distance, relative};

/// `‖x - P(x - w)‖`, relative to the problem normalization.
fn natural_map_error(vi: &VariationalInequality<'_>, x: &[f64], w: &[f64]) -> f64 {
    let mut p: Vec<f64> = x.iter().zip(w).map(|(xi, wi)| xi - wi).collect();
    vi.project(&mut p);
    relative(distance(x, &p), vi.normalization())
}

/// Natural-map error at `x`; `w` receives `F(x)`.
pub fn compute_error(
    vi: &VariationalInequality<'_>,
    x: &[f64],
    w: &mut [f64],
    tolerance: f64,
) -> Result<ErrorEstimate> {
    vi.evaluate(x, w)?;
    Ok(ErrorEstimate::new(natural_map_error(vi, x, w), tolerance))
}

/// `out = P(x - rho w)`.
fn projected_step(vi: &VariationalInequality<'_>, x: &[f64], w: &[f64], rho: f64, out: &mut [f64]) {
    for ((o, xi), wi) in out.iter_mut().zip(x).zip(w) {
        *o = xi - rho * wi;
    }
    vi.project(out);
}

/// Fixed-point projection `x ← P(x - rho F(x))`.
pub fn fixed_point_projection(
    vi: &VariationalInequality<'_>,
    x: &mut [f64],
    w: &mut [f64],
    options: &ProjectedGradientOptions,
) -> Result<SolverOutcome> {
    projection_method(vi, x, w, options, false)
}

/// Korpelevich extragradient: predictor `x̄ = P(x - rho F(x))`, corrector
/// `x ← P(x - rho F(x̄))`.
pub fn extragradient(
    vi: &VariationalInequality<'_>,
    x: &mut [f64],
    w: &mut [f64],
    options: &ProjectedGradientOptions,
) -> Result<SolverOutcome> {
    projection_method(vi, x, w, options, true)
}

fn projection_method(
    vi: &VariationalInequality<'_>,
    x: &mut [f64],
    w: &mut [f64],
    options: &ProjectedGradientOptions,
    corrector: bool,
) -> Result<SolverOutcome> {
    options.validate()?;
    let n = vi.size();
    if x.len() != n {
        return Err(Error::dimension("VI solution x", n, x.len()));
    }
    if w.len() != n {
        return Err(Error::dimension("VI value w", n, w.len()));
    }
    let name = if corrector {
        "extragradient"
    } else {
        "fixed point projection"
    };
    log::debug!("{name}: size {n}, {:?}", options.step);

    let mut x_k = x.to_vec();
    let mut w_k = vec![0.0; n];
    vi.evaluate(&x_k, &mut w_k)?;
    let mut x_bar = vec![0.0; n];
    let mut w_bar = vec![0.0; n];
    let mut x_new = vec![0.0; n];
    let mut w_new = vec![0.0; n];

    let mut rho = options.step.initial_rho();
    let mut error = natural_map_error(vi, &x_k, &w_k);
    let mut outcome = None;

    for iteration in 1..=options.max_iterations {
        // Predictor with step control.
        let (mut a1, mut a2) = (0.0, 0.0);
        let attempts = match options.step {
            StepRule::Constant { .. } => 1,
            StepRule::Adaptive {
                max_line_search, ..
            } => max_line_search,
        };
        for _ in 0..attempts {
            projected_step(vi, &x_k, &w_k, rho, &mut x_bar);
            vi.evaluate(&x_bar, &mut w_bar)?;
            a1 = distance(&w_k, &w_bar);
            a2 = distance(&x_k, &x_bar);
            match options.step {
                StepRule::Adaptive { tau, l, .. } if rho * a1 > l * a2 => rho *= tau,
                _ => break,
            }
        }

        if corrector {
            projected_step(vi, &x_k, &w_bar, rho, &mut x_new);
            vi.evaluate(&x_new, &mut w_new)?;
        } else {
            x_new.copy_from_slice(&x_bar);
            w_new.copy_from_slice(&w_bar);
        }

        if !all_finite(&x_new) || !all_finite(&w_new) || !rho.is_finite() {
            outcome = Some(SolverOutcome::breakdown(
                iteration - 1,
                error,
                "non-finite iterate",
            ));
            break;
        }

        if let StepRule::Adaptive { tauinv, lmin, .. } = options.step {
            if rho * a1 < lmin * a2 {
                rho *= tauinv;
            }
        }

        std::mem::swap(&mut x_k, &mut x_new);
        std::mem::swap(&mut w_k, &mut w_new);
        error = natural_map_error(vi, &x_k, &w_k);
        log::trace!("{name}: iteration {iteration}, error {error:e}, rho {rho:e}");

        if error <= options.tolerance {
            outcome = Some(SolverOutcome::converged(iteration, error));
            break;
        }
    }

    x.copy_from_slice(&x_k);
    w.copy_from_slice(&w_k);
    let outcome =
        outcome.unwrap_or_else(|| SolverOutcome::iteration_limit(options.max_iterations, error));
    outcome.log(name);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::SolverStatus;
    use crate::projection::{BoxProjection, NonNegativeOrthant};

    /// `F(x) = A x + b` with a monotone, non-symmetric `A`.
    fn affine_vi<'a>() -> VariationalInequality<'a> {
        VariationalInequality::new(
            2,
            |x: &[f64], f: &mut [f64]| {
                f[0] = 2.0 * x[0] + x[1] - 1.0;
                f[1] = -x[0] + 2.0 * x[1] + 1.0;
                Ok(())
            },
            NonNegativeOrthant,
        )
    }

    #[test]
    fn test_fixed_point_projection_converges() {
        let vi = affine_vi();
        let mut x = [0.0; 2];
        let mut w = [0.0; 2];
        let outcome = fixed_point_projection(
            &vi,
            &mut x,
            &mut w,
            &ProjectedGradientOptions {
                tolerance: 1e-10,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(outcome.is_converged(), "{outcome:?}");
        // x = (1/2, 0), F(x) = (0, 1/2)
        assert!((x[0] - 0.5).abs() < 1e-8 && x[1].abs() < 1e-8);
        assert!((w[1] - 0.5).abs() < 1e-8);
    }

    #[test]
    fn test_extragradient_constant_step() {
        let vi = affine_vi();
        let mut x = [1.0, 1.0];
        let mut w = [0.0; 2];
        let options = ProjectedGradientOptions {
            tolerance: 1e-10,
            step: StepRule::Constant { rho: 0.2 },
            ..Default::default()
        };
        let outcome = extragradient(&vi, &mut x, &mut w, &options).unwrap();
        assert!(outcome.is_converged(), "{outcome:?}");
        assert!((x[0] - 0.5).abs() < 1e-8 && x[1].abs() < 1e-8);

        let estimate = compute_error(&vi, &x, &mut w, 1e-8).unwrap();
        assert!(estimate.converged);
    }

    #[test]
    fn test_box_constrained() {
        // F(x) = x - 3 on [0, 1]: solution at the upper bound.
        let vi = VariationalInequality::new(
            1,
            |x: &[f64], f: &mut [f64]| {
                f[0] = x[0] - 3.0;
                Ok(())
            },
            BoxProjection::new(vec![0.0], vec![1.0]),
        );
        let mut x = [0.0];
        let mut w = [0.0];
        let outcome = extragradient(&vi, &mut x, &mut w, &Default::default()).unwrap();
        assert!(outcome.is_converged());
        assert!((x[0] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_nan_is_breakdown() {
        let vi = VariationalInequality::new(
            1,
            |x: &[f64], f: &mut [f64]| {
                f[0] = if x[0] == 0.0 { -1.0 } else { f64::NAN };
                Ok(())
            },
            NonNegativeOrthant,
        );
        let mut x = [0.0];
        let mut w = [0.0];
        let options = ProjectedGradientOptions {
            step: StepRule::Constant { rho: 1.0 },
            ..Default::default()
        };
        let outcome = fixed_point_projection(&vi, &mut x, &mut w, &options).unwrap();
        assert!(matches!(outcome.status, SolverStatus::NumericalBreakdown(_)));
        assert_eq!(x, [0.0]);
        assert_eq!(w, [-1.0]);
    }

    #[test]
    fn test_iteration_limit() {
        let vi = affine_vi();
        let mut x = [5.0, 5.0];
        let mut w = [0.0; 2];
        let options = ProjectedGradientOptions {
            max_iterations: 2,
            tolerance: 1e-14,
            ..Default::default()
        };
        let outcome = fixed_point_projection(&vi, &mut x, &mut w, &options).unwrap();
        assert_eq!(outcome.status, SolverStatus::IterationLimit);
        assert_eq!(outcome.iterations, 2);
    }
}
