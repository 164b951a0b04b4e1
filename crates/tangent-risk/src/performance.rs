//! Portfolio performance
//!
//! For weights w, expected returns μ and covariance Σ:
//! - return     = wᵀμ
//! - volatility = √(wᵀΣw)
//! - Sharpe     = (return - r_f) / volatility

use crate::capm::RiskFreeRate;
use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Volatility below which the Sharpe ratio is treated as undefined.
pub const MIN_VOLATILITY: f64 = 1e-12;

/// Expected return and volatility of a weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPerformance {
    /// Annualized expected return
    pub expected_return: f64,
    /// Annualized volatility
    pub volatility: f64,
}

impl PortfolioPerformance {
    /// Sharpe ratio against a risk-free rate.
    pub fn sharpe_ratio(&self, risk_free_rate: RiskFreeRate) -> Result<f64> {
        sharpe_ratio(self.expected_return, self.volatility, risk_free_rate)
    }
}

/// Evaluate a weight vector.
pub fn performance(
    weights: &Array1<f64>,
    expected_returns: &Array1<f64>,
    covariance: &Array2<f64>,
) -> Result<PortfolioPerformance> {
    if expected_returns.len() != weights.len() {
        return Err(RiskError::DimensionMismatch(format!(
            "{} expected returns but {} weights",
            expected_returns.len(),
            weights.len()
        )));
    }

    Ok(PortfolioPerformance {
        expected_return: weights.dot(expected_returns),
        volatility: portfolio_volatility(weights, covariance)?,
    })
}

/// Portfolio variance wᵀΣw.
pub fn portfolio_variance(weights: &Array1<f64>, covariance: &Array2<f64>) -> Result<f64> {
    let n = weights.len();
    if covariance.dim() != (n, n) {
        return Err(RiskError::DimensionMismatch(format!(
            "covariance is {:?} but there are {} weights",
            covariance.dim(),
            n
        )));
    }
    Ok(weights.dot(&covariance.dot(weights)))
}

/// Portfolio volatility √(wᵀΣw).
///
/// Tiny negative variances from rounding are clamped to zero.
pub fn portfolio_volatility(weights: &Array1<f64>, covariance: &Array2<f64>) -> Result<f64> {
    Ok(portfolio_variance(weights, covariance)?.max(0.0).sqrt())
}

/// Sharpe ratio (return - r_f) / volatility.
///
/// Fails with [`RiskError::ZeroVolatility`] instead of returning infinity.
pub fn sharpe_ratio(
    expected_return: f64,
    volatility: f64,
    risk_free_rate: RiskFreeRate,
) -> Result<f64> {
    if !volatility.is_finite() || volatility < MIN_VOLATILITY {
        return Err(RiskError::ZeroVolatility);
    }
    Ok((expected_return - risk_free_rate.value()) / volatility)
}
