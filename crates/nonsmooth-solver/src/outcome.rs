//! Convergence report shared by every solver.

use std::fmt;

/// How a solver run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverStatus {
    /// The error estimate dropped below the tolerance.
    Converged,
    /// The iteration budget ran out first.
    IterationLimit,
    /// A non-finite iterate or a singular system stopped the run. The
    /// returned iterate is the last finite one.
    NumericalBreakdown(String),
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverStatus::Converged => write!(f, "converged"),
            SolverStatus::IterationLimit => write!(f, "iteration limit reached"),
            SolverStatus::NumericalBreakdown(reason) => write!(f, "numerical breakdown: {reason}"),
        }
    }
}

/// Result of a solver run. The solution itself is written into the caller's
/// buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    /// Final status.
    pub status: SolverStatus,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Final error estimate.
    pub error: f64,
}

impl SolverOutcome {
    pub fn converged(iterations: usize, error: f64) -> Self {
        Self {
            status: SolverStatus::Converged,
            iterations,
            error,
        }
    }

    pub fn iteration_limit(iterations: usize, error: f64) -> Self {
        Self {
            status: SolverStatus::IterationLimit,
            iterations,
            error,
        }
    }

    pub fn breakdown(iterations: usize, error: f64, reason: impl Into<String>) -> Self {
        Self {
            status: SolverStatus::NumericalBreakdown(reason.into()),
            iterations,
            error,
        }
    }

    /// Converged or not from the final error.
    pub(crate) fn from_error(iterations: usize, error: f64, tolerance: f64) -> Self {
        if error <= tolerance {
            Self::converged(iterations, error)
        } else {
            Self::iteration_limit(iterations, error)
        }
    }

    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }

    /// Emit the end-of-run log line.
    pub(crate) fn log(&self, solver: &str) {
        match &self.status {
            SolverStatus::Converged => log::debug!(
                "{solver}: converged in {} iterations, error {:e}",
                self.iterations,
                self.error
            ),
            SolverStatus::IterationLimit => log::warn!(
                "{solver}: no convergence after {} iterations, error {:e}",
                self.iterations,
                self.error
            ),
            SolverStatus::NumericalBreakdown(reason) => log::warn!(
                "{solver}: breakdown after {} iterations: {reason}",
                self.iterations
            ),
        }
    }
}

/// Error estimate with its convergence verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorEstimate {
    pub error: f64,
    pub converged: bool,
}

impl ErrorEstimate {
    pub(crate) fn new(error: f64, tolerance: f64) -> Self {
        Self {
            error,
            converged: error <= tolerance,
        }
    }
}
