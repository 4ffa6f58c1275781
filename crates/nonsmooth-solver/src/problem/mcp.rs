use nalgebra::DMatrix;

use super::vi::VectorFunction;
use crate::error::{Error, Result};

/// `∇F(z)` written into a dense matrix.
pub type JacobianFunction<'a> = Box<dyn Fn(&[f64], &mut DMatrix<f64>) -> Result<()> + 'a>;

/// Find `z = (z_e, z_i)` with `F(z) = (w_e, w_i)`, `w_e = 0` and
/// `0 <= z_i ⟂ w_i >= 0`.
///
/// The first `n_equalities` components are the equality block.
pub struct MixedComplementarityProblem<'a> {
    n_equalities: usize,
    n_complementarity: usize,
    function: VectorFunction<'a>,
    jacobian: JacobianFunction<'a>,
}

impl<'a> MixedComplementarityProblem<'a> {
    pub fn new(
        n_equalities: usize,
        n_complementarity: usize,
        function: impl Fn(&[f64], &mut [f64]) -> Result<()> + 'a,
        jacobian: impl Fn(&[f64], &mut DMatrix<f64>) -> Result<()> + 'a,
    ) -> Result<Self> {
        if n_equalities + n_complementarity == 0 {
            return Err(Error::InvalidProblem("empty mixed complementarity problem".into()));
        }
        Ok(Self {
            n_equalities,
            n_complementarity,
            function: Box::new(function),
            jacobian: Box::new(jacobian),
        })
    }

    pub fn n_equalities(&self) -> usize {
        self.n_equalities
    }

    pub fn n_complementarity(&self) -> usize {
        self.n_complementarity
    }

    pub fn size(&self) -> usize {
        self.n_equalities + self.n_complementarity
    }

    pub fn evaluate(&self, z: &[f64], f: &mut [f64]) -> Result<()> {
        if z.len() != self.size() {
            return Err(Error::dimension("MCP argument", self.size(), z.len()));
        }
        if f.len() != self.size() {
            return Err(Error::dimension("MCP value", self.size(), f.len()));
        }
        (self.function)(z, f)
    }

    pub fn jacobian(&self, z: &[f64], jac: &mut DMatrix<f64>) -> Result<()> {
        let n = self.size();
        if z.len() != n {
            return Err(Error::dimension("MCP jacobian argument", n, z.len()));
        }
        if jac.shape() != (n, n) {
            return Err(Error::Core(nonsmooth_core::Error::ShapeMismatch {
                context: "MCP jacobian",
                expected: (n, n),
                actual: jac.shape(),
            }));
        }
        (self.jacobian)(z, jac)
    }
}
