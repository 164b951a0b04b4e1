//! Error types for risk and return modelling.

use crate::covariance::CovarianceError;
use thiserror::Error;

/// Result type for risk modelling operations.
pub type Result<T> = std::result::Result<T, RiskError>;

/// Errors that can occur while building or evaluating a return model.
#[derive(Debug, Error)]
pub enum RiskError {
    /// Covariance estimation error
    #[error("Covariance error: {0}")]
    Covariance(#[from] CovarianceError),

    /// Not enough aligned observations
    #[error("Insufficient data: need at least {required} aligned observations, got {actual}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// Dimension mismatch
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// NaN or infinite input
    #[error("Non-finite value in {0}")]
    NonFinite(String),

    /// Non-positive price, which makes a percentage change undefined
    #[error("Non-positive price {price} for {symbol} at row {row}")]
    NonPositivePrice {
        /// Symbol with the bad price
        symbol: String,
        /// Row index in the price history
        row: usize,
        /// Offending price
        price: f64,
    },

    /// Benchmark series required but absent
    #[error("Benchmark series is missing")]
    MissingBenchmark,

    /// Volatility is zero, so the Sharpe ratio is undefined
    #[error("Portfolio volatility is zero; Sharpe ratio is undefined")]
    ZeroVolatility,
}
