//! Inner-solver tolerance adaptation for composite solvers.
//!
//! Outer loops (Gauss-Seidel sweeps, the Tresca fixed point) drive an inner
//! per-contact or per-problem solve. The inner tolerance is tightened from
//! the current outer error with one of three strategies.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the inner tolerance follows the outer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InternalErrorStrategy {
    /// Keep the caller-supplied inner tolerance.
    GivenValue,
    /// `max(outer_error / ratio, tolerance / contacts)`.
    Adaptive,
    /// `outer_error / (ratio * contacts)`.
    AdaptivePerContact,
}

impl InternalErrorStrategy {
    /// Identifier used in raw `iparam` arrays.
    pub fn id(self) -> i32 {
        match self {
            InternalErrorStrategy::GivenValue => 0,
            InternalErrorStrategy::Adaptive => 1,
            InternalErrorStrategy::AdaptivePerContact => 2,
        }
    }
}

impl TryFrom<i32> for InternalErrorStrategy {
    type Error = Error;

    fn try_from(id: i32) -> Result<Self> {
        match id {
            0 => Ok(InternalErrorStrategy::GivenValue),
            1 => Ok(InternalErrorStrategy::Adaptive),
            2 => Ok(InternalErrorStrategy::AdaptivePerContact),
            other => Err(Error::Configuration(format!(
                "unknown internal error strategy id {other}"
            ))),
        }
    }
}

/// Strategy plus its ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InternalSolverTolerance {
    pub strategy: InternalErrorStrategy,
    /// Divides the outer error in the adaptive strategies.
    pub ratio: f64,
}

impl Default for InternalSolverTolerance {
    fn default() -> Self {
        Self {
            strategy: InternalErrorStrategy::Adaptive,
            ratio: 10.0,
        }
    }
}

impl InternalSolverTolerance {
    pub fn given_value() -> Self {
        Self {
            strategy: InternalErrorStrategy::GivenValue,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ratio.is_nan() || self.ratio <= 0.0 {
            return Err(Error::Configuration(format!(
                "internal error ratio must be positive, got {}",
                self.ratio
            )));
        }
        Ok(())
    }

    /// Inner tolerance to use for the next inner solve.
    ///
    /// `current` is returned untouched by [`InternalErrorStrategy::GivenValue`].
    pub fn inner_tolerance(
        &self,
        outer_error: f64,
        outer_tolerance: f64,
        contacts: usize,
        current: f64,
    ) -> f64 {
        let contacts = contacts.max(1) as f64;
        let tol = match self.strategy {
            InternalErrorStrategy::GivenValue => current,
            InternalErrorStrategy::Adaptive => {
                (outer_error / self.ratio).max(outer_tolerance / contacts)
            }
            InternalErrorStrategy::AdaptivePerContact => outer_error / (self.ratio * contacts),
        };
        log::debug!(
            "internal solver tolerance set to {tol:e} ({:?})",
            self.strategy
        );
        tol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-15 * b.abs().max(1.0)
    }

    #[test]
    fn test_strategies() {
        let mut t = InternalSolverTolerance::default();
        assert!(approx(t.inner_tolerance(1e-3, 1e-6, 5, 0.5), 1e-4));

        t.strategy = InternalErrorStrategy::AdaptivePerContact;
        assert!(approx(t.inner_tolerance(1e-3, 1e-6, 5, 0.5), 2e-5));

        t.strategy = InternalErrorStrategy::GivenValue;
        assert_eq!(t.inner_tolerance(1e-3, 1e-6, 5, 0.5), 0.5);
    }

    #[test]
    fn test_adaptive_floor() {
        let t = InternalSolverTolerance::default();
        // outer error already tiny: the global tolerance per contact wins
        assert!(approx(t.inner_tolerance(1e-9, 1e-6, 2, 1.0), 5e-7));
    }

    #[test]
    fn test_strategy_ids() {
        for s in [
            InternalErrorStrategy::GivenValue,
            InternalErrorStrategy::Adaptive,
            InternalErrorStrategy::AdaptivePerContact,
        ] {
            assert_eq!(InternalErrorStrategy::try_from(s.id()).unwrap(), s);
        }
        assert!(matches!(
            InternalErrorStrategy::try_from(7),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_ratio() {
        let t = InternalSolverTolerance {
            ratio: 0.0,
            ..Default::default()
        };
        assert!(t.validate().is_err());
    }
}
