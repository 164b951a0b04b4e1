//! Capital Asset Pricing Model
//!
//! Expected return of an instrument as a linear function of its market beta:
//!
//! E[R_i] = r_f + β_i × (E[R_m] - r_f)

use crate::error::{Result, RiskError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Beta assumed when an instrument's metadata does not carry one.
pub const DEFAULT_BETA: f64 = 1.0;

/// Annualized risk-free rate expressed as a fraction (0.05 for 5%).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskFreeRate(f64);

impl RiskFreeRate {
    /// Zero risk-free rate.
    pub const ZERO: Self = Self(0.0);

    /// Create from a fraction, e.g. `0.045`.
    pub fn from_fraction(rate: f64) -> Result<Self> {
        if !rate.is_finite() {
            return Err(RiskError::NonFinite("risk-free rate".to_string()));
        }
        Ok(Self(rate))
    }

    /// Create from a quoted percentage, e.g. `4.5` (how T-bill yields are quoted).
    pub fn from_percent(percent: f64) -> Result<Self> {
        Self::from_fraction(percent / 100.0)
    }

    /// The rate as a fraction.
    pub const fn value(self) -> f64 {
        self.0
    }
}

/// CAPM expected return for a single beta.
pub const fn capm_expected_return(beta: f64, risk_free_rate: f64, market_return: f64) -> f64 {
    risk_free_rate + beta * (market_return - risk_free_rate)
}

/// CAPM pricing for one evaluation: a risk-free rate and a market return.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CapmModel {
    /// Annualized risk-free rate
    pub risk_free_rate: RiskFreeRate,
    /// Annualized expected market (benchmark) return
    pub market_return: f64,
}

impl CapmModel {
    /// Create a CAPM model.
    pub fn new(risk_free_rate: RiskFreeRate, market_return: f64) -> Result<Self> {
        if !market_return.is_finite() {
            return Err(RiskError::NonFinite("market return".to_string()));
        }
        Ok(Self {
            risk_free_rate,
            market_return,
        })
    }

    /// Market risk premium E[R_m] - r_f.
    pub const fn market_premium(&self) -> f64 {
        self.market_return - self.risk_free_rate.value()
    }

    /// Expected return for one beta.
    pub const fn expected_return(&self, beta: f64) -> f64 {
        capm_expected_return(beta, self.risk_free_rate.value(), self.market_return)
    }

    /// Expected returns for a set of instruments.
    ///
    /// Missing or non-finite betas fall back to [`DEFAULT_BETA`].
    pub fn expected_returns(&self, betas: &[Option<f64>]) -> Array1<f64> {
        betas
            .iter()
            .enumerate()
            .map(|(i, beta)| {
                let beta = match beta {
                    Some(b) if b.is_finite() => *b,
                    _ => {
                        debug!(
                            asset = i,
                            fallback = DEFAULT_BETA,
                            "beta unavailable, using default"
                        );
                        DEFAULT_BETA
                    }
                };
                self.expected_return(beta)
            })
            .collect()
    }
}
