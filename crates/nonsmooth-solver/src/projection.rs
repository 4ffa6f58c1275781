//! Projection operators onto the convex sets the solvers work with.
//!
//! Every projection-based method in this crate (projected Gauss-Seidel,
//! projected gradient, ADMM, extragradient, the friction-contact local
//! solvers) goes through [`Projection`].

/// In-place Euclidean projection onto a closed convex set.
pub trait Projection {
    fn project(&self, x: &mut [f64]);
}

impl<P: Projection + ?Sized> Projection for &P {
    fn project(&self, x: &mut [f64]) {
        (**self).project(x);
    }
}

/// `R^n`: the identity map.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconstrained;

impl Projection for Unconstrained {
    fn project(&self, _x: &mut [f64]) {}
}

/// `R^n_+`, componentwise `max(0, x)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonNegativeOrthant;

impl Projection for NonNegativeOrthant {
    fn project(&self, x: &mut [f64]) {
        for v in x.iter_mut() {
            *v = v.max(0.0);
        }
    }
}

/// Componentwise bounds `lower <= x <= upper`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxProjection {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl BoxProjection {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self { lower, upper }
    }
}

impl Projection for BoxProjection {
    fn project(&self, x: &mut [f64]) {
        for ((v, lo), hi) in x.iter_mut().zip(&self.lower).zip(&self.upper) {
            *v = v.max(*lo).min(*hi);
        }
    }
}

/// Where a point landed relative to the cone it was projected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConeRegion {
    /// Already inside; unchanged.
    Interior,
    /// Projected onto the lateral surface.
    Boundary,
    /// Projected onto the apex.
    Vertex,
}

#[inline]
fn tangent_norm(r: &[f64]) -> f64 {
    r[1..].iter().map(|t| t * t).sum::<f64>().sqrt()
}

/// Project one contact reaction `r = (r_n, r_t...)` onto the Coulomb cone
/// `‖r_t‖ <= mu r_n`. Works for 2D and 3D contacts.
pub fn project_on_cone(r: &mut [f64], mu: f64) -> ConeRegion {
    let norm_t = tangent_norm(r);
    if mu * norm_t <= -r[0] {
        r.iter_mut().for_each(|v| *v = 0.0);
        ConeRegion::Vertex
    } else if norm_t <= mu * r[0] {
        ConeRegion::Interior
    } else {
        let rn = (mu * norm_t + r[0]) / (mu * mu + 1.0);
        r[0] = rn;
        let factor = mu * rn / norm_t;
        for t in &mut r[1..] {
            *t *= factor;
        }
        ConeRegion::Boundary
    }
}

/// Project one contact reaction onto the Tresca cylinder
/// `r_n >= 0, ‖r_t‖ <= threshold`.
pub fn project_on_cylinder(r: &mut [f64], threshold: f64) {
    r[0] = r[0].max(0.0);
    let norm_t = tangent_norm(r);
    if norm_t > threshold {
        let factor = threshold.max(0.0) / norm_t;
        for t in &mut r[1..] {
            *t *= factor;
        }
    }
}

/// Product of Coulomb cones, one per contact of size `dimension`.
#[derive(Debug, Clone, PartialEq)]
pub struct CoulombConeProjection {
    pub dimension: usize,
    pub mu: Vec<f64>,
}

impl CoulombConeProjection {
    pub fn new(dimension: usize, mu: Vec<f64>) -> Self {
        Self { dimension, mu }
    }
}

impl Projection for CoulombConeProjection {
    fn project(&self, x: &mut [f64]) {
        for (r, &mu) in x.chunks_exact_mut(self.dimension).zip(&self.mu) {
            project_on_cone(r, mu);
        }
    }
}

/// Product of Tresca cylinders with per-contact slide thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct TrescaCylinderProjection {
    pub dimension: usize,
    pub thresholds: Vec<f64>,
}

impl TrescaCylinderProjection {
    pub fn new(dimension: usize, thresholds: Vec<f64>) -> Self {
        Self {
            dimension,
            thresholds,
        }
    }
}

impl Projection for TrescaCylinderProjection {
    fn project(&self, x: &mut [f64]) {
        for (r, &g) in x.chunks_exact_mut(self.dimension).zip(&self.thresholds) {
            project_on_cylinder(r, g);
        }
    }
}
