//! Error types for the optimizer.

use std::fmt;
use tangent_risk::RiskError;
use thiserror::Error;

/// Result type for optimizer operations.
pub type Result<T> = std::result::Result<T, SolverError>;

/// Optimization phase, used to tag failures and log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Minimum-variance solve
    MinimumVariance,
    /// Maximum-Sharpe solve under the risk ceiling
    MaximumSharpe,
}

impl Phase {
    /// Stable name for logs and error payloads.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MinimumVariance => "minimum_variance",
            Self::MaximumSharpe => "maximum_sharpe",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that can occur while solving.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The weight constraints admit no solution
    #[error("Infeasible constraints: {0}")]
    Infeasible(String),

    /// Iteration limit reached before convergence
    #[error("{phase} did not converge after {iterations} iterations")]
    NotConverged {
        /// Phase that failed
        phase: Phase,
        /// Iterations performed
        iterations: usize,
    },

    /// Objective or gradient became NaN or infinite
    #[error("{phase} produced a non-finite objective or gradient")]
    NonFinite {
        /// Phase that failed
        phase: Phase,
    },

    /// Wall-clock budget exhausted
    #[error("{phase} exceeded its time budget of {budget_ms}ms")]
    TimedOut {
        /// Phase that was running
        phase: Phase,
        /// Budget in milliseconds
        budget_ms: u64,
    },

    /// Error from the return model
    #[error("Risk model error: {0}")]
    Risk(#[from] RiskError),
}

impl SolverError {
    /// Phase the failure happened in, when it is tied to one.
    pub const fn phase(&self) -> Option<Phase> {
        match self {
            Self::NotConverged { phase, .. }
            | Self::NonFinite { phase }
            | Self::TimedOut { phase, .. } => Some(*phase),
            Self::Infeasible(_) | Self::Risk(_) => None,
        }
    }
}
