use nonsmooth_core::NumericMatrix;

use crate::error::{Error, Result};
use crate::projection::Projection;

/// `A x + b ∈ C` in a [`ConvexQp`].
#[derive(Debug, Clone)]
pub struct LinearConstraint {
    pub a: NumericMatrix,
    pub b: Vec<f64>,
}

/// Minimize `½ xᵀ M x + qᵀ x` subject to `A x + b ∈ C`, where `C` is given by
/// its projection. Without an explicit constraint, `A = I` and `b = 0`.
///
/// `M` is assumed symmetric positive semidefinite.
pub struct ConvexQp<'a> {
    m: NumericMatrix,
    q: Vec<f64>,
    constraint: Option<LinearConstraint>,
    projection: Box<dyn Projection + 'a>,
}

impl<'a> ConvexQp<'a> {
    pub fn new(m: NumericMatrix, q: Vec<f64>, projection: impl Projection + 'a) -> Result<Self> {
        if m.nrows() != m.ncols() {
            return Err(Error::InvalidProblem(format!(
                "QP matrix must be square, got {}x{}",
                m.nrows(),
                m.ncols()
            )));
        }
        if q.len() != m.nrows() {
            return Err(Error::dimension("QP vector q", m.nrows(), q.len()));
        }
        Ok(Self {
            m,
            q,
            constraint: None,
            projection: Box::new(projection),
        })
    }

    /// Replace the implicit `x ∈ C` by `A x + b ∈ C`.
    pub fn with_constraint(mut self, a: NumericMatrix, b: Vec<f64>) -> Result<Self> {
        if a.ncols() != self.size() {
            return Err(Error::dimension("QP constraint columns", self.size(), a.ncols()));
        }
        if b.len() != a.nrows() {
            return Err(Error::dimension("QP constraint vector b", a.nrows(), b.len()));
        }
        self.constraint = Some(LinearConstraint { a, b });
        Ok(self)
    }

    pub fn size(&self) -> usize {
        self.q.len()
    }

    /// Size of `A x + b`.
    pub fn constraint_size(&self) -> usize {
        self.constraint.as_ref().map_or(self.size(), |c| c.a.nrows())
    }

    pub fn m(&self) -> &NumericMatrix {
        &self.m
    }

    pub fn q(&self) -> &[f64] {
        &self.q
    }

    pub fn constraint(&self) -> Option<&LinearConstraint> {
        self.constraint.as_ref()
    }

    pub fn project(&self, x: &mut [f64]) {
        self.projection.project(x);
    }

    pub fn projection(&self) -> &(dyn Projection + 'a) {
        &*self.projection
    }

    /// `g = M x + q`.
    pub fn gradient(&self, x: &[f64], g: &mut [f64]) -> Result<()> {
        g.copy_from_slice(&self.q);
        self.m.gemv(1.0, x, 1.0, g)?;
        Ok(())
    }

    /// `½ xᵀ M x + qᵀ x`.
    pub fn objective(&self, x: &[f64]) -> Result<f64> {
        let mut mx = vec![0.0; self.size()];
        self.m.gemv(1.0, x, 0.0, &mut mx)?;
        Ok(x.iter()
            .zip(mx.iter().zip(&self.q))
            .map(|(xi, (mxi, qi))| xi * (0.5 * mxi + qi))
            .sum())
    }

    /// `A x + b`, or `x` when unconstrained.
    pub fn constraint_value(&self, x: &[f64], out: &mut [f64]) -> Result<()> {
        match &self.constraint {
            Some(c) => {
                out.copy_from_slice(&c.b);
                c.a.gemv(1.0, x, 1.0, out)?;
            }
            None => out.copy_from_slice(x),
        }
        Ok(())
    }

    /// `out = Aᵀ y`, or `y` when unconstrained.
    pub fn constraint_transpose(&self, y: &[f64], out: &mut [f64]) -> Result<()> {
        match &self.constraint {
            Some(c) => {
                out.iter_mut().for_each(|v| *v = 0.0);
                for (i, j, v) in c.a.triplets() {
                    out[j] += v * y[i];
                }
            }
            None => out.copy_from_slice(y),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::NonNegativeOrthant;
    use nalgebra::dmatrix;

    #[test]
    fn test_objective_and_gradient() {
        let qp = ConvexQp::new(
            NumericMatrix::dense(dmatrix![2.0, 0.0; 0.0, 4.0]),
            vec![-2.0, 1.0],
            NonNegativeOrthant,
        )
        .unwrap();
        assert_eq!(qp.objective(&[1.0, 1.0]).unwrap(), 1.0 + 2.0 - 2.0 + 1.0);
        let mut g = [0.0; 2];
        qp.gradient(&[1.0, 1.0], &mut g).unwrap();
        assert_eq!(g, [0.0, 5.0]);
        assert_eq!(qp.constraint_size(), 2);
    }

    #[test]
    fn test_constraint() {
        let qp = ConvexQp::new(NumericMatrix::identity(2), vec![0.0; 2], NonNegativeOrthant)
            .unwrap()
            .with_constraint(NumericMatrix::dense(dmatrix![1.0, 1.0]), vec![-1.0])
            .unwrap();
        assert_eq!(qp.constraint_size(), 1);
        let mut v = [0.0];
        qp.constraint_value(&[2.0, 3.0], &mut v).unwrap();
        assert_eq!(v, [4.0]);
        let mut t = [0.0; 2];
        qp.constraint_transpose(&[2.0], &mut t).unwrap();
        assert_eq!(t, [2.0, 2.0]);

        let bad = ConvexQp::new(NumericMatrix::identity(2), vec![0.0; 2], NonNegativeOrthant)
            .unwrap()
            .with_constraint(NumericMatrix::identity(3), vec![0.0; 3]);
        assert!(bad.is_err());
    }
}
