//! Solver options.
//!
//! Each solver family takes a typed, validated options struct. The flat
//! `iparam` / `dparam` layout used by problem files and foreign callers is
//! kept as [`RawSolverOptions`] and converted eagerly with `TryFrom`, so an
//! unknown strategy id fails before any iteration runs. [`SolverOptions`]
//! wraps every family for JSON configuration files.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tolerance::{InternalErrorStrategy, InternalSolverTolerance};

/// Integer parameter indices in [`RawSolverOptions::iparam`].
pub mod iparam {
    pub const MAX_ITER: usize = 0;
    /// Written back with the number of iterations done.
    pub const ITER_DONE: usize = 1;
    pub const INTERNAL_ERROR_STRATEGY: usize = 2;
    pub const INTERNAL_MAX_ITER: usize = 3;
    pub const LOCAL_SOLVER: usize = 4;
    pub const ADMM_INITIAL_RHO: usize = 5;
    pub const ADMM_RHO_STRATEGY: usize = 6;
    pub const LEN: usize = 7;
}

/// Real parameter indices in [`RawSolverOptions::dparam`].
pub mod dparam {
    pub const TOL: usize = 0;
    /// Written back with the final error.
    pub const RESIDU: usize = 1;
    pub const INTERNAL_ERROR_RATIO: usize = 2;
    /// Step size. Positive selects the adaptive rule, negative a constant
    /// step of `-rho`.
    pub const RHO: usize = 3;
    pub const TAU: usize = 4;
    pub const TAUINV: usize = 5;
    pub const L: usize = 6;
    pub const LMIN: usize = 7;
    pub const INTERNAL_TOL: usize = 8;
    pub const RELAXATION: usize = 9;
    pub const LEN: usize = 10;
}

fn config(message: impl Into<String>) -> Error {
    Error::Configuration(message.into())
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_nan() || value <= 0.0 {
        return Err(config(format!("{name} must be positive, got {value}")));
    }
    Ok(())
}

fn check_iterations(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(config(format!("{name} must be at least 1")));
    }
    Ok(())
}

/// Positional options. `-1` integers and NaN reals mark entries left at
/// their default; any other negative integer is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSolverOptions {
    pub iparam: Vec<i32>,
    pub dparam: Vec<f64>,
}

impl Default for RawSolverOptions {
    fn default() -> Self {
        Self {
            iparam: vec![-1; iparam::LEN],
            dparam: vec![f64::NAN; dparam::LEN],
        }
    }
}

impl RawSolverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_iparam(mut self, index: usize, value: i32) -> Self {
        if self.iparam.len() <= index {
            self.iparam.resize(index + 1, -1);
        }
        self.iparam[index] = value;
        self
    }

    pub fn with_dparam(mut self, index: usize, value: f64) -> Self {
        if self.dparam.len() <= index {
            self.dparam.resize(index + 1, f64::NAN);
        }
        self.dparam[index] = value;
        self
    }

    /// Integer entry, `None` when absent or `-1`.
    pub fn int(&self, index: usize) -> Result<Option<i32>> {
        match self.iparam.get(index).copied() {
            None | Some(-1) => Ok(None),
            Some(v) if v < 0 => Err(config(format!("iparam[{index}] = {v} is negative"))),
            Some(v) => Ok(Some(v)),
        }
    }

    pub fn real(&self, index: usize) -> Option<f64> {
        self.dparam.get(index).copied().filter(|v| !v.is_nan())
    }

    fn count(&self, index: usize, default: usize) -> Result<usize> {
        Ok(self.int(index)?.map_or(default, |v| v as usize))
    }

    fn internal_tolerance(&self, default: InternalSolverTolerance) -> Result<InternalSolverTolerance> {
        let strategy = match self.int(iparam::INTERNAL_ERROR_STRATEGY)? {
            Some(id) => InternalErrorStrategy::try_from(id)?,
            None => default.strategy,
        };
        Ok(InternalSolverTolerance {
            strategy,
            ratio: self.real(dparam::INTERNAL_ERROR_RATIO).unwrap_or(default.ratio),
        })
    }

    /// Record the outcome of a run, as positional callers expect.
    pub fn record(&mut self, iterations: usize, error: f64) {
        if self.iparam.len() <= iparam::ITER_DONE {
            self.iparam.resize(iparam::ITER_DONE + 1, -1);
        }
        if self.dparam.len() <= dparam::RESIDU {
            self.dparam.resize(dparam::RESIDU + 1, f64::NAN);
        }
        self.iparam[iparam::ITER_DONE] = i32::try_from(iterations).unwrap_or(i32::MAX);
        self.dparam[dparam::RESIDU] = error;
    }
}

/// Lexicographic Lemke pivoting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LemkeOptions {
    /// Maximum number of complementary pivots.
    pub max_pivots: usize,
    /// Entries below this magnitude are not used as pivots.
    pub pivot_tolerance: f64,
    /// Tolerance on the final LCP error.
    pub tolerance: f64,
}

impl Default for LemkeOptions {
    fn default() -> Self {
        Self {
            max_pivots: 10_000,
            pivot_tolerance: 1e-12,
            tolerance: 1e-8,
        }
    }
}

impl LemkeOptions {
    pub fn validate(&self) -> Result<()> {
        check_iterations("max_pivots", self.max_pivots)?;
        check_positive("pivot_tolerance", self.pivot_tolerance)?;
        check_positive("tolerance", self.tolerance)
    }
}

impl TryFrom<&RawSolverOptions> for LemkeOptions {
    type Error = Error;

    fn try_from(raw: &RawSolverOptions) -> Result<Self> {
        let d = Self::default();
        let options = Self {
            max_pivots: raw.count(iparam::MAX_ITER, d.max_pivots)?,
            pivot_tolerance: d.pivot_tolerance,
            tolerance: raw.real(dparam::TOL).unwrap_or(d.tolerance),
        };
        options.validate()?;
        Ok(options)
    }
}

/// Projected Gauss-Seidel with optional over-relaxation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PgsOptions {
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Relaxation factor in `(0, 2)`; `1.0` is plain PGS.
    pub relaxation: f64,
}

impl Default for PgsOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-6,
            relaxation: 1.0,
        }
    }
}

impl PgsOptions {
    /// Loose tolerance and a short budget, for warm-started time stepping.
    pub fn fast() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-4,
            ..Self::default()
        }
    }

    pub fn precise() -> Self {
        Self {
            max_iterations: 10_000,
            tolerance: 1e-10,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_iterations("max_iterations", self.max_iterations)?;
        check_positive("tolerance", self.tolerance)?;
        if !(self.relaxation > 0.0 && self.relaxation < 2.0) {
            return Err(config(format!(
                "relaxation must lie in (0, 2), got {}",
                self.relaxation
            )));
        }
        Ok(())
    }
}

impl TryFrom<&RawSolverOptions> for PgsOptions {
    type Error = Error;

    fn try_from(raw: &RawSolverOptions) -> Result<Self> {
        let d = Self::default();
        let options = Self {
            max_iterations: raw.count(iparam::MAX_ITER, d.max_iterations)?,
            tolerance: raw.real(dparam::TOL).unwrap_or(d.tolerance),
            relaxation: raw.real(dparam::RELAXATION).unwrap_or(d.relaxation),
        };
        options.validate()?;
        Ok(options)
    }
}

/// Step-size rule of projection methods.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case", deny_unknown_fields)]
pub enum StepRule {
    /// Fixed step `rho`.
    Constant { rho: f64 },
    /// Self-adaptive step: shrink by `tau` until
    /// `rho ‖F(x) - F(x̄)‖ <= l ‖x - x̄‖`, grow by `tauinv` when the ratio
    /// falls below `lmin`.
    Adaptive {
        rho: f64,
        tau: f64,
        tauinv: f64,
        l: f64,
        lmin: f64,
        max_line_search: usize,
    },
}

impl Default for StepRule {
    fn default() -> Self {
        StepRule::adaptive(1.0)
    }
}

impl StepRule {
    /// Adaptive rule with the usual `tau = 2/3, tauinv = 3/2, L = 0.9,
    /// Lmin = 0.3`.
    pub fn adaptive(rho: f64) -> Self {
        StepRule::Adaptive {
            rho,
            tau: 2.0 / 3.0,
            tauinv: 3.0 / 2.0,
            l: 0.9,
            lmin: 0.3,
            max_line_search: 100,
        }
    }

    pub fn initial_rho(&self) -> f64 {
        match *self {
            StepRule::Constant { rho } | StepRule::Adaptive { rho, .. } => rho,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            StepRule::Constant { rho } => check_positive("rho", rho),
            StepRule::Adaptive {
                rho,
                tau,
                tauinv,
                l,
                lmin,
                max_line_search,
            } => {
                check_positive("rho", rho)?;
                if !(tau > 0.0 && tau < 1.0) {
                    return Err(config(format!("tau must lie in (0, 1), got {tau}")));
                }
                if tauinv.is_nan() || tauinv < 1.0 {
                    return Err(config(format!("tauinv must be at least 1, got {tauinv}")));
                }
                check_positive("L", l)?;
                if lmin.is_nan() || lmin < 0.0 || lmin > l {
                    return Err(config(format!("Lmin must lie in [0, L], got {lmin}")));
                }
                check_iterations("max_line_search", max_line_search)
            }
        }
    }
}

/// Projected gradient, fixed-point projection and extragradient methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectedGradientOptions {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub step: StepRule,
}

impl Default for ProjectedGradientOptions {
    fn default() -> Self {
        Self {
            max_iterations: 20_000,
            tolerance: 1e-6,
            step: StepRule::default(),
        }
    }
}

impl ProjectedGradientOptions {
    pub fn validate(&self) -> Result<()> {
        check_iterations("max_iterations", self.max_iterations)?;
        check_positive("tolerance", self.tolerance)?;
        self.step.validate()
    }
}

impl TryFrom<&RawSolverOptions> for ProjectedGradientOptions {
    type Error = Error;

    fn try_from(raw: &RawSolverOptions) -> Result<Self> {
        let d = Self::default();
        let rho = raw.real(dparam::RHO).unwrap_or(d.step.initial_rho());
        let mut step = if rho < 0.0 {
            StepRule::Constant { rho: -rho }
        } else {
            StepRule::adaptive(rho)
        };
        if let StepRule::Adaptive {
            tau, tauinv, l, lmin, ..
        } = &mut step
        {
            for (target, index) in [
                (tau, dparam::TAU),
                (tauinv, dparam::TAUINV),
                (l, dparam::L),
                (lmin, dparam::LMIN),
            ] {
                if let Some(v) = raw.real(index) {
                    *target = v;
                }
            }
        }
        let options = Self {
            max_iterations: raw.count(iparam::MAX_ITER, d.max_iterations)?,
            tolerance: raw.real(dparam::TOL).unwrap_or(d.tolerance),
            step,
        };
        options.validate()?;
        Ok(options)
    }
}

/// Initial ADMM penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialRho {
    /// Use [`AdmmOptions::rho`].
    Given,
    /// Use the infinity norm of `M`.
    NormInf,
}

impl TryFrom<i32> for InitialRho {
    type Error = Error;

    fn try_from(id: i32) -> Result<Self> {
        match id {
            0 => Ok(InitialRho::Given),
            1 => Ok(InitialRho::NormInf),
            other => Err(config(format!("unknown ADMM initial rho id {other}"))),
        }
    }
}

/// ADMM penalty update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case", deny_unknown_fields)]
pub enum RhoStrategy {
    Constant,
    /// Multiply or divide rho by `factor` when one residual exceeds the
    /// other by more than `mu`.
    ResidualBalancing { mu: f64, factor: f64 },
}

impl TryFrom<i32> for RhoStrategy {
    type Error = Error;

    fn try_from(id: i32) -> Result<Self> {
        match id {
            0 => Ok(RhoStrategy::Constant),
            1 => Ok(RhoStrategy::ResidualBalancing {
                mu: 10.0,
                factor: 2.0,
            }),
            other => Err(config(format!("unknown ADMM rho strategy id {other}"))),
        }
    }
}

/// Alternating direction method of multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdmmOptions {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub rho: f64,
    pub initial_rho: InitialRho,
    pub rho_strategy: RhoStrategy,
}

impl Default for AdmmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 20_000,
            tolerance: 1e-6,
            rho: 1.0,
            initial_rho: InitialRho::Given,
            rho_strategy: RhoStrategy::Constant,
        }
    }
}

impl AdmmOptions {
    pub fn validate(&self) -> Result<()> {
        check_iterations("max_iterations", self.max_iterations)?;
        check_positive("tolerance", self.tolerance)?;
        check_positive("rho", self.rho)?;
        if let RhoStrategy::ResidualBalancing { mu, factor } = self.rho_strategy {
            if mu.is_nan() || mu <= 1.0 || factor.is_nan() || factor <= 1.0 {
                return Err(config(format!(
                    "residual balancing needs mu > 1 and factor > 1, got {mu} and {factor}"
                )));
            }
        }
        Ok(())
    }
}

impl TryFrom<&RawSolverOptions> for AdmmOptions {
    type Error = Error;

    fn try_from(raw: &RawSolverOptions) -> Result<Self> {
        let d = Self::default();
        let options = Self {
            max_iterations: raw.count(iparam::MAX_ITER, d.max_iterations)?,
            tolerance: raw.real(dparam::TOL).unwrap_or(d.tolerance),
            rho: raw.real(dparam::RHO).unwrap_or(d.rho),
            initial_rho: raw
                .int(iparam::ADMM_INITIAL_RHO)?
                .map_or(Ok(d.initial_rho), InitialRho::try_from)?,
            rho_strategy: raw
                .int(iparam::ADMM_RHO_STRATEGY)?
                .map_or(Ok(d.rho_strategy), RhoStrategy::try_from)?,
        };
        options.validate()?;
        Ok(options)
    }
}

/// Semismooth Newton with Armijo backtracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NewtonOptions {
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Sufficient decrease constant.
    pub armijo_sigma: f64,
    /// Step shrink factor per backtrack.
    pub backtrack_factor: f64,
    pub max_backtracks: usize,
}

impl Default for NewtonOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-10,
            armijo_sigma: 1e-4,
            backtrack_factor: 0.5,
            max_backtracks: 30,
        }
    }
}

impl NewtonOptions {
    pub fn validate(&self) -> Result<()> {
        check_iterations("max_iterations", self.max_iterations)?;
        check_positive("tolerance", self.tolerance)?;
        if !(self.armijo_sigma > 0.0 && self.armijo_sigma < 0.5) {
            return Err(config(format!(
                "armijo_sigma must lie in (0, 0.5), got {}",
                self.armijo_sigma
            )));
        }
        if !(self.backtrack_factor > 0.0 && self.backtrack_factor < 1.0) {
            return Err(config(format!(
                "backtrack_factor must lie in (0, 1), got {}",
                self.backtrack_factor
            )));
        }
        Ok(())
    }
}

impl TryFrom<&RawSolverOptions> for NewtonOptions {
    type Error = Error;

    fn try_from(raw: &RawSolverOptions) -> Result<Self> {
        let d = Self::default();
        let options = Self {
            max_iterations: raw.count(iparam::MAX_ITER, d.max_iterations)?,
            tolerance: raw.real(dparam::TOL).unwrap_or(d.tolerance),
            ..d
        };
        options.validate()?;
        Ok(options)
    }
}

/// One-contact solver used inside Gauss-Seidel sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalSolverKind {
    /// A single projected step with `rho = 1 / W_nn`.
    ProjectionOnCone,
    /// Projected steps repeated until the local error drops below the
    /// local tolerance, with an adaptive `rho`.
    ProjectionOnConeWithLocalIteration,
    /// Alart-Curnier semismooth Newton with a line search, falling back to
    /// projected iterations when Newton stalls.
    NonsmoothNewton,
}

impl TryFrom<i32> for LocalSolverKind {
    type Error = Error;

    fn try_from(id: i32) -> Result<Self> {
        match id {
            0 => Ok(LocalSolverKind::ProjectionOnCone),
            1 => Ok(LocalSolverKind::ProjectionOnConeWithLocalIteration),
            2 => Ok(LocalSolverKind::NonsmoothNewton),
            other => Err(config(format!("unknown local solver id {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalSolverOptions {
    pub kind: LocalSolverKind,
    pub max_iterations: usize,
    /// Starting local tolerance; adapted by the outer loop.
    pub tolerance: f64,
}

impl Default for LocalSolverOptions {
    fn default() -> Self {
        Self {
            kind: LocalSolverKind::ProjectionOnConeWithLocalIteration,
            max_iterations: 100,
            tolerance: 1e-12,
        }
    }
}

impl LocalSolverOptions {
    pub fn validate(&self) -> Result<()> {
        check_iterations("local max_iterations", self.max_iterations)?;
        check_positive("local tolerance", self.tolerance)
    }
}

/// Nonsmooth Gauss-Seidel over contacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NsgsOptions {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub local: LocalSolverOptions,
    pub internal: InternalSolverTolerance,
}

impl Default for NsgsOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-4,
            local: LocalSolverOptions::default(),
            internal: InternalSolverTolerance::default(),
        }
    }
}

impl NsgsOptions {
    pub fn fast() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-3,
            local: LocalSolverOptions {
                kind: LocalSolverKind::ProjectionOnCone,
                ..LocalSolverOptions::default()
            },
            ..Self::default()
        }
    }

    pub fn precise() -> Self {
        Self {
            max_iterations: 10_000,
            tolerance: 1e-8,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_iterations("max_iterations", self.max_iterations)?;
        check_positive("tolerance", self.tolerance)?;
        self.local.validate()?;
        self.internal.validate()
    }
}

impl TryFrom<&RawSolverOptions> for NsgsOptions {
    type Error = Error;

    fn try_from(raw: &RawSolverOptions) -> Result<Self> {
        let d = Self::default();
        let local = LocalSolverOptions {
            kind: raw
                .int(iparam::LOCAL_SOLVER)?
                .map_or(Ok(d.local.kind), LocalSolverKind::try_from)?,
            max_iterations: raw.count(iparam::INTERNAL_MAX_ITER, d.local.max_iterations)?,
            tolerance: raw.real(dparam::INTERNAL_TOL).unwrap_or(d.local.tolerance),
        };
        let options = Self {
            max_iterations: raw.count(iparam::MAX_ITER, d.max_iterations)?,
            tolerance: raw.real(dparam::TOL).unwrap_or(d.tolerance),
            local,
            internal: raw.internal_tolerance(d.internal)?,
        };
        options.validate()?;
        Ok(options)
    }
}

/// Fixed point on the slide thresholds of a sequence of Tresca problems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrescaFixedPointOptions {
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Inner Tresca solver; its tolerance is adapted every outer iteration.
    pub inner: NsgsOptions,
    pub internal: InternalSolverTolerance,
}

impl Default for TrescaFixedPointOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-4,
            inner: NsgsOptions {
                max_iterations: 100,
                ..NsgsOptions::default()
            },
            internal: InternalSolverTolerance::default(),
        }
    }
}

impl TrescaFixedPointOptions {
    pub fn validate(&self) -> Result<()> {
        check_iterations("max_iterations", self.max_iterations)?;
        check_positive("tolerance", self.tolerance)?;
        self.inner.validate()?;
        self.internal.validate()
    }
}

impl TryFrom<&RawSolverOptions> for TrescaFixedPointOptions {
    type Error = Error;

    fn try_from(raw: &RawSolverOptions) -> Result<Self> {
        let d = Self::default();
        let mut inner = d.inner.clone();
        inner.max_iterations = raw.count(iparam::INTERNAL_MAX_ITER, inner.max_iterations)?;
        inner.tolerance = raw.real(dparam::INTERNAL_TOL).unwrap_or(inner.tolerance);
        let options = Self {
            max_iterations: raw.count(iparam::MAX_ITER, d.max_iterations)?,
            tolerance: raw.real(dparam::TOL).unwrap_or(d.tolerance),
            inner,
            internal: raw.internal_tolerance(d.internal)?,
        };
        options.validate()?;
        Ok(options)
    }
}

/// Options of any solver, tagged by solver name for configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "solver", rename_all = "snake_case")]
pub enum SolverOptions {
    Lemke(LemkeOptions),
    Pgs(PgsOptions),
    ProjectedGradient(ProjectedGradientOptions),
    Admm(AdmmOptions),
    Extragradient(ProjectedGradientOptions),
    FixedPointProjection(ProjectedGradientOptions),
    Newton(NewtonOptions),
    Nsgs(NsgsOptions),
    TrescaFixedPoint(TrescaFixedPointOptions),
}

impl SolverOptions {
    /// Parse and validate a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        let options: SolverOptions =
            serde_json::from_str(text).map_err(|e| config(format!("bad options JSON: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            SolverOptions::Lemke(o) => o.validate(),
            SolverOptions::Pgs(o) => o.validate(),
            SolverOptions::ProjectedGradient(o)
            | SolverOptions::Extragradient(o)
            | SolverOptions::FixedPointProjection(o) => o.validate(),
            SolverOptions::Admm(o) => o.validate(),
            SolverOptions::Newton(o) => o.validate(),
            SolverOptions::Nsgs(o) => o.validate(),
            SolverOptions::TrescaFixedPoint(o) => o.validate(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SolverOptions::Lemke(_) => "lemke",
            SolverOptions::Pgs(_) => "pgs",
            SolverOptions::ProjectedGradient(_) => "projected_gradient",
            SolverOptions::Admm(_) => "admm",
            SolverOptions::Extragradient(_) => "extragradient",
            SolverOptions::FixedPointProjection(_) => "fixed_point_projection",
            SolverOptions::Newton(_) => "newton",
            SolverOptions::Nsgs(_) => "nsgs",
            SolverOptions::TrescaFixedPoint(_) => "tresca_fixed_point",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        LemkeOptions::default().validate().unwrap();
        PgsOptions::default().validate().unwrap();
        PgsOptions::fast().validate().unwrap();
        PgsOptions::precise().validate().unwrap();
        ProjectedGradientOptions::default().validate().unwrap();
        AdmmOptions::default().validate().unwrap();
        NewtonOptions::default().validate().unwrap();
        NsgsOptions::default().validate().unwrap();
        NsgsOptions::fast().validate().unwrap();
        NsgsOptions::precise().validate().unwrap();
        TrescaFixedPointOptions::default().validate().unwrap();
    }

    #[test]
    fn test_raw_rho_sign_selects_step_rule() {
        let raw = RawSolverOptions::new().with_dparam(dparam::RHO, -0.25);
        let options = ProjectedGradientOptions::try_from(&raw).unwrap();
        assert_eq!(options.step, StepRule::Constant { rho: 0.25 });

        let raw = RawSolverOptions::new()
            .with_dparam(dparam::RHO, 2.0)
            .with_dparam(dparam::TAU, 0.5)
            .with_iparam(iparam::MAX_ITER, 42);
        let options = ProjectedGradientOptions::try_from(&raw).unwrap();
        assert_eq!(options.max_iterations, 42);
        match options.step {
            StepRule::Adaptive { rho, tau, .. } => {
                assert_eq!(rho, 2.0);
                assert_eq!(tau, 0.5);
            }
            other => panic!("expected adaptive rule, got {other:?}"),
        }
    }

    #[test]
    fn test_raw_unknown_strategy_is_rejected() {
        let raw = RawSolverOptions::new().with_iparam(iparam::INTERNAL_ERROR_STRATEGY, 9);
        assert!(matches!(
            NsgsOptions::try_from(&raw),
            Err(Error::Configuration(_))
        ));
        let raw = RawSolverOptions::new().with_iparam(iparam::ADMM_RHO_STRATEGY, 5);
        assert!(AdmmOptions::try_from(&raw).is_err());
    }

    #[test]
    fn test_raw_nsgs_fields() {
        let raw = RawSolverOptions::new()
            .with_iparam(iparam::MAX_ITER, 7)
            .with_iparam(iparam::INTERNAL_ERROR_STRATEGY, 2)
            .with_iparam(iparam::LOCAL_SOLVER, 0)
            .with_dparam(dparam::TOL, 1e-9)
            .with_dparam(dparam::INTERNAL_ERROR_RATIO, 4.0);
        let options = NsgsOptions::try_from(&raw).unwrap();
        assert_eq!(options.max_iterations, 7);
        assert_eq!(options.tolerance, 1e-9);
        assert_eq!(
            options.internal.strategy,
            InternalErrorStrategy::AdaptivePerContact
        );
        assert_eq!(options.internal.ratio, 4.0);
        assert_eq!(options.local.kind, LocalSolverKind::ProjectionOnCone);
    }

    #[test]
    fn test_raw_invalid_value_fails_validation() {
        let raw = RawSolverOptions::new().with_dparam(dparam::RELAXATION, 2.5);
        assert!(PgsOptions::try_from(&raw).is_err());
    }

    #[test]
    fn test_raw_only_minus_one_means_default() {
        let raw = RawSolverOptions::new().with_iparam(iparam::MAX_ITER, -1);
        assert_eq!(PgsOptions::try_from(&raw).unwrap().max_iterations, 1000);

        let raw = RawSolverOptions::new().with_iparam(iparam::MAX_ITER, -5);
        assert!(matches!(PgsOptions::try_from(&raw), Err(Error::Configuration(_))));

        let raw = RawSolverOptions::new().with_iparam(iparam::LOCAL_SOLVER, -2);
        assert!(matches!(NsgsOptions::try_from(&raw), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_json_rejects_unknown_fields() {
        let misspelled = SolverOptions::from_json(r#"{"solver": "nsgs", "tolerence": 1e-10}"#);
        assert!(matches!(misspelled, Err(Error::Configuration(_))));

        let nested = SolverOptions::from_json(
            r#"{"solver": "nsgs", "local": {"kind": "projection_on_cone", "max_iter": 5}}"#,
        );
        assert!(matches!(nested, Err(Error::Configuration(_))));

        let step = SolverOptions::from_json(
            r#"{"solver": "projected_gradient", "step": {"rule": "constant", "rho": 0.5, "tau": 1.0}}"#,
        );
        assert!(matches!(step, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_record() {
        let mut raw = RawSolverOptions {
            iparam: vec![],
            dparam: vec![],
        };
        raw.record(12, 3e-7);
        assert_eq!(raw.int(iparam::ITER_DONE).unwrap(), Some(12));
        assert_eq!(raw.real(dparam::RESIDU), Some(3e-7));
    }

    #[test]
    fn test_json_round_trip() {
        let options = SolverOptions::Nsgs(NsgsOptions::precise());
        let text = options.to_json().unwrap();
        assert_eq!(SolverOptions::from_json(&text).unwrap(), options);
    }

    #[test]
    fn test_json_partial_fields_use_defaults() {
        let options =
            SolverOptions::from_json(r#"{"solver": "pgs", "tolerance": 1e-9}"#).unwrap();
        assert_eq!(
            options,
            SolverOptions::Pgs(PgsOptions {
                tolerance: 1e-9,
                ..PgsOptions::default()
            })
        );
        assert_eq!(options.name(), "pgs");
    }

    #[test]
    fn test_json_rejects_invalid() {
        assert!(SolverOptions::from_json(r#"{"solver": "admm", "rho": -1.0}"#).is_err());
        assert!(SolverOptions::from_json(r#"{"solver": "unknown"}"#).is_err());
        let options = SolverOptions::from_json(
            r#"{"solver": "projected_gradient", "step": {"rule": "constant", "rho": 0.5}}"#,
        )
        .unwrap();
        assert_eq!(
            options,
            SolverOptions::ProjectedGradient(ProjectedGradientOptions {
                step: StepRule::Constant { rho: 0.5 },
                ..ProjectedGradientOptions::default()
            })
        );
    }
}
