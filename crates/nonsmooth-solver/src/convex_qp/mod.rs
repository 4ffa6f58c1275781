//! Convex QP solvers: projected gradient and ADMM.

mod admm;

pub use admm::admm;

use crate::error::{Error, Result};
use crate::options::ProjectedGradientOptions;
use crate::outcome::{ErrorEstimate, SolverOutcome};
use crate::problem::{ConvexQp, VariationalInequality};
use crate::vector::{distance, norm2, relative};

/// KKT error of `x` with multiplier `y` for `A x + b ∈ C`.
///
/// Without an explicit constraint this is the natural-map residual
/// `‖x - P(x - (M x + q))‖` and `y` is ignored. With one, it is
/// `‖M x + q + Aᵀ y‖ + ‖ξ - P(ξ + y)‖` with `ξ = A x + b`. Both are relative
/// to `‖q‖`. `w` receives `M x + q`.
pub fn compute_error(
    qp: &ConvexQp<'_>,
    x: &[f64],
    y: &[f64],
    w: &mut [f64],
    tolerance: f64,
) -> Result<ErrorEstimate> {
    let n = qp.size();
    if x.len() != n {
        return Err(Error::dimension("QP solution x", n, x.len()));
    }
    if w.len() != n {
        return Err(Error::dimension("QP gradient w", n, w.len()));
    }
    qp.gradient(x, w)?;
    let error = match qp.constraint() {
        None => {
            let mut p: Vec<f64> = x.iter().zip(w.iter()).map(|(xi, wi)| xi - wi).collect();
            qp.project(&mut p);
            distance(x, &p)
        }
        Some(_) => {
            let m = qp.constraint_size();
            if y.len() != m {
                return Err(Error::dimension("QP multiplier", m, y.len()));
            }
            let mut aty = vec![0.0; n];
            qp.constraint_transpose(y, &mut aty)?;
            let stationarity: f64 = w
                .iter()
                .zip(&aty)
                .map(|(wi, ai)| (wi + ai) * (wi + ai))
                .sum::<f64>()
                .sqrt();

            let mut xi = vec![0.0; m];
            qp.constraint_value(x, &mut xi)?;
            let mut p: Vec<f64> = xi.iter().zip(y).map(|(a, b)| a + b).collect();
            qp.project(&mut p);
            stationarity + distance(&xi, &p)
        }
    };
    Ok(ErrorEstimate::new(
        relative(error, norm2(qp.q())),
        tolerance,
    ))
}

/// Projected gradient `x ← P(x - rho (M x + q))` for a QP whose constraint
/// is `x ∈ C`. `w` receives `M x + q`.
pub fn projected_gradient(
    qp: &ConvexQp<'_>,
    x: &mut [f64],
    w: &mut [f64],
    options: &ProjectedGradientOptions,
) -> Result<SolverOutcome> {
    if qp.constraint().is_some() {
        return Err(Error::InvalidProblem(
            "projected gradient needs an identity constraint; use ADMM for A x + b ∈ C".into(),
        ));
    }
    let vi = VariationalInequality::new(
        qp.size(),
        |x: &[f64], f: &mut [f64]| qp.gradient(x, f),
        qp.projection(),
    )
    .with_normalization(norm2(qp.q()))?;
    crate::vi::fixed_point_projection(&vi, x, w, options)
}
