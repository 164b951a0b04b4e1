//! Portfolio objectives.

use crate::solver::Objective;
use ndarray::{Array1, Array2};
use tangent_risk::MIN_VOLATILITY;

/// Portfolio variance wᵀΣw.
#[derive(Debug, Clone, Copy)]
pub struct Variance<'a> {
    covariance: &'a Array2<f64>,
}

impl<'a> Variance<'a> {
    /// Variance objective over a covariance matrix.
    pub const fn new(covariance: &'a Array2<f64>) -> Self {
        Self { covariance }
    }
}

impl Objective for Variance<'_> {
    fn value(&self, weights: &Array1<f64>) -> f64 {
        weights.dot(&self.covariance.dot(weights))
    }

    fn gradient(&self, weights: &Array1<f64>) -> Array1<f64> {
        self.covariance.dot(weights) * 2.0
    }
}

/// Negative Sharpe ratio -(μᵀw - r_f) / √(wᵀΣw).
///
/// Infinite wherever the volatility falls below [`MIN_VOLATILITY`].
#[derive(Debug, Clone, Copy)]
pub struct NegativeSharpe<'a> {
    expected_returns: &'a Array1<f64>,
    covariance: &'a Array2<f64>,
    risk_free_rate: f64,
}

impl<'a> NegativeSharpe<'a> {
    /// Negative Sharpe objective.
    pub const fn new(
        expected_returns: &'a Array1<f64>,
        covariance: &'a Array2<f64>,
        risk_free_rate: f64,
    ) -> Self {
        Self {
            expected_returns,
            covariance,
            risk_free_rate,
        }
    }
}

impl Objective for NegativeSharpe<'_> {
    fn value(&self, weights: &Array1<f64>) -> f64 {
        let volatility = weights.dot(&self.covariance.dot(weights)).max(0.0).sqrt();
        if volatility < MIN_VOLATILITY {
            return f64::INFINITY;
        }
        -(weights.dot(self.expected_returns) - self.risk_free_rate) / volatility
    }

    // ∇ = -μ/σ + (μᵀw - r_f) Σw / σ³
    fn gradient(&self, weights: &Array1<f64>) -> Array1<f64> {
        let sigma_w = self.covariance.dot(weights);
        let volatility = weights.dot(&sigma_w).max(0.0).sqrt();
        if volatility < MIN_VOLATILITY {
            return Array1::from_elem(weights.len(), f64::NAN);
        }
        let excess = weights.dot(self.expected_returns) - self.risk_free_rate;
        sigma_w * (excess / volatility.powi(3)) - self.expected_returns / volatility
    }
}
