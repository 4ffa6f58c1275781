use crate::error::{Error, Result};
use crate::projection::Projection;

/// `F(x)` written into the output slice.
pub type VectorFunction<'a> = Box<dyn Fn(&[f64], &mut [f64]) -> Result<()> + 'a>;

/// Find `x ∈ X` with `(y - x)ᵀ F(x) >= 0` for all `y ∈ X`, where `X` is
/// given by its projection.
pub struct VariationalInequality<'a> {
    size: usize,
    function: VectorFunction<'a>,
    projection: Box<dyn Projection + 'a>,
    normalization: f64,
}

impl<'a> VariationalInequality<'a> {
    pub fn new(
        size: usize,
        function: impl Fn(&[f64], &mut [f64]) -> Result<()> + 'a,
        projection: impl Projection + 'a,
    ) -> Self {
        Self {
            size,
            function: Box::new(function),
            projection: Box::new(projection),
            normalization: 1.0,
        }
    }

    /// Scale used to make the error relative, typically `‖F(0)‖`.
    pub fn with_normalization(mut self, normalization: f64) -> Result<Self> {
        if normalization.is_nan() || normalization < 0.0 {
            return Err(Error::InvalidProblem(format!(
                "normalization must be non-negative, got {normalization}"
            )));
        }
        self.normalization = normalization;
        Ok(self)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn normalization(&self) -> f64 {
        self.normalization
    }

    pub fn evaluate(&self, x: &[f64], f: &mut [f64]) -> Result<()> {
        if x.len() != self.size {
            return Err(Error::dimension("VI argument", self.size, x.len()));
        }
        if f.len() != self.size {
            return Err(Error::dimension("VI value", self.size, f.len()));
        }
        (self.function)(x, f)
    }

    pub fn project(&self, x: &mut [f64]) {
        self.projection.project(x);
    }
}
