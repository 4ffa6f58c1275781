use nonsmooth_core::NumericMatrix;

use crate::error::{Error, Result};

/// Find `z, w` with `w = M z + q`, `0 <= z ⟂ w >= 0`.
#[derive(Debug, Clone)]
pub struct LinearComplementarityProblem {
    m: NumericMatrix,
    q: Vec<f64>,
}

impl LinearComplementarityProblem {
    pub fn new(m: NumericMatrix, q: Vec<f64>) -> Result<Self> {
        if m.nrows() != m.ncols() {
            return Err(Error::InvalidProblem(format!(
                "LCP matrix must be square, got {}x{}",
                m.nrows(),
                m.ncols()
            )));
        }
        if q.len() != m.nrows() {
            return Err(Error::dimension("LCP vector q", m.nrows(), q.len()));
        }
        Ok(Self { m, q })
    }

    pub fn size(&self) -> usize {
        self.q.len()
    }

    pub fn m(&self) -> &NumericMatrix {
        &self.m
    }

    pub fn m_mut(&mut self) -> &mut NumericMatrix {
        &mut self.m
    }

    pub fn q(&self) -> &[f64] {
        &self.q
    }

    pub fn into_parts(self) -> (NumericMatrix, Vec<f64>) {
        (self.m, self.q)
    }

    /// `w = M z + q`.
    pub fn velocity(&self, z: &[f64], w: &mut [f64]) -> Result<()> {
        w.copy_from_slice(&self.q);
        self.m.gemv(1.0, z, 1.0, w)?;
        Ok(())
    }

    pub(crate) fn check_buffers(&self, z: &[f64], w: &[f64]) -> Result<()> {
        if z.len() != self.size() {
            return Err(Error::dimension("LCP solution z", self.size(), z.len()));
        }
        if w.len() != self.size() {
            return Err(Error::dimension("LCP solution w", self.size(), w.len()));
        }
        Ok(())
    }
}
