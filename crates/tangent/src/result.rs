//! Result records returned to callers.

use crate::config::ExpectedReturnSource;
use chrono::NaiveDate;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Weights below this are solver noise and shown as zero.
pub const DISPLAY_EPSILON: f64 = 1e-8;

/// Full optimization result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Tickers in request order
    pub tickers: Vec<String>,
    /// Weights in ticker order
    pub weights: Vec<f64>,
    /// Annualized expected return
    pub expected_return: f64,
    /// Annualized volatility
    pub volatility: f64,
    /// Sharpe ratio of the reported return and volatility
    pub sharpe_ratio: f64,
    /// Lowest volatility achievable under the weight caps
    pub min_volatility: f64,
    /// Query date
    pub date: NaiveDate,
    /// Risk-free rate the Sharpe ratio is measured against
    pub risk_free_rate: f64,
    /// Model that produced the expected returns
    pub expected_return_source: ExpectedReturnSource,
    /// True when the risk ceiling was below `min_volatility` and the
    /// minimum-variance weights were returned instead
    pub risk_ceiling_infeasible: bool,
    /// True when the maximum-Sharpe weights sit on the risk ceiling
    pub risk_ceiling_active: bool,
}

impl OptimizationResult {
    /// `(ticker, weight)` pairs in request order.
    pub fn allocations(&self) -> impl Iterator<Item = (&str, f64)> {
        self.tickers
            .iter()
            .map(String::as_str)
            .zip(self.weights.iter().copied())
    }
}

/// Minimum-volatility result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimumVolatilityResult {
    /// Tickers in request order
    pub tickers: Vec<String>,
    /// Weights in ticker order
    pub weights: Vec<f64>,
    /// Annualized volatility of the weights
    pub min_volatility: f64,
    /// Query date
    pub date: NaiveDate,
}

impl MinimumVolatilityResult {
    /// `(ticker, weight)` pairs in request order.
    pub fn allocations(&self) -> impl Iterator<Item = (&str, f64)> {
        self.tickers
            .iter()
            .map(String::as_str)
            .zip(self.weights.iter().copied())
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(i32::try_from(decimals).unwrap_or(i32::MAX));
    if !scale.is_finite() {
        return value;
    }
    (value * scale).round() / scale
}

/// Weights for display: noise below [`DISPLAY_EPSILON`] becomes zero, nothing
/// is renormalized.
pub fn display_weights(weights: &Array1<f64>) -> Vec<f64> {
    weights
        .iter()
        .map(|&w| if w.abs() < DISPLAY_EPSILON { 0.0 } else { w })
        .collect()
}
