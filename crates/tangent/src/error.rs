//! Error taxonomy of the orchestrator.
//!
//! Every failure of a portfolio request is returned as a [`PortfolioError`];
//! nothing is retried here. Retrying belongs to the data source.

use serde::{Deserialize, Serialize};
use std::fmt;
use tangent_optimize::SolverError;
use tangent_risk::{RiskError, covariance::CovarianceError};
use thiserror::Error;

/// Result type for portfolio requests.
pub type Result<T> = std::result::Result<T, PortfolioError>;

/// A data source could not deliver what was asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataUnavailable {
    /// Ticker, benchmark or rate symbol the failure concerns
    pub subject: String,
    /// Human-readable cause
    pub reason: String,
}

impl DataUnavailable {
    /// Create a data-unavailable report.
    pub fn new(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DataUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.reason)
    }
}

impl std::error::Error for DataUnavailable {}

/// Errors returned by portfolio requests.
#[derive(Debug, Error)]
pub enum PortfolioError {
    /// Market data source unreachable or ticker unknown
    #[error("Data unavailable for {0}")]
    DataUnavailable(#[from] DataUnavailable),

    /// Not enough aligned price history
    #[error("Insufficient data: need at least {required} aligned observations, got {actual}")]
    InsufficientData {
        /// Minimum required
        required: usize,
        /// Available
        actual: usize,
    },

    /// The weight caps cannot produce a fully invested portfolio
    #[error("Infeasible constraints: {0}")]
    InfeasibleConstraints(String),

    /// The solver did not produce a solution
    #[error("Optimization failed in {phase}: {reason}")]
    OptimizationFailed {
        /// Stage that failed
        phase: String,
        /// Cause
        reason: String,
    },

    /// The portfolio has zero volatility, so its Sharpe ratio is undefined
    #[error("Portfolio volatility is zero; Sharpe ratio is undefined")]
    ZeroVolatility,

    /// Malformed request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl PortfolioError {
    /// Stable machine-readable tag.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DataUnavailable(_) => "data_unavailable",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::InfeasibleConstraints(_) => "infeasible_constraints",
            Self::OptimizationFailed { .. } => "optimization_failed",
            Self::ZeroVolatility => "zero_volatility",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl From<RiskError> for PortfolioError {
    fn from(err: RiskError) -> Self {
        match err {
            RiskError::InsufficientData { required, actual }
            | RiskError::Covariance(CovarianceError::InsufficientData { required, actual }) => {
                Self::InsufficientData { required, actual }
            }
            RiskError::ZeroVolatility => Self::ZeroVolatility,
            RiskError::MissingBenchmark => {
                Self::DataUnavailable(DataUnavailable::new("benchmark", "no benchmark prices"))
            }
            RiskError::NonPositivePrice { symbol, row, price } => {
                Self::DataUnavailable(DataUnavailable::new(
                    symbol,
                    format!("non-positive price {} at row {}", price, row),
                ))
            }
            other => Self::OptimizationFailed {
                phase: "return_model".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<SolverError> for PortfolioError {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::Infeasible(reason) => Self::InfeasibleConstraints(reason),
            SolverError::Risk(risk) => risk.into(),
            other => Self::OptimizationFailed {
                phase: other
                    .phase()
                    .map_or_else(|| "solver".to_string(), |p| p.to_string()),
                reason: other.to_string(),
            },
        }
    }
}
