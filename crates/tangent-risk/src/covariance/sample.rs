//! Annualized sample covariance.
//!
//! Σ = (R - r̄)ᵀ (R - r̄) / (T - 1) × annualization

use super::{CovarianceError, CovarianceEstimator, utils::symmetrize};
use crate::returns::TRADING_DAYS_PER_YEAR;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Unbiased sample covariance scaled to annual units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SampleCovarianceEstimator {
    annualization: f64,
}

impl Default for SampleCovarianceEstimator {
    fn default() -> Self {
        Self::annualized()
    }
}

impl SampleCovarianceEstimator {
    /// Daily returns scaled by 252 trading days.
    pub const fn annualized() -> Self {
        Self {
            annualization: TRADING_DAYS_PER_YEAR,
        }
    }

    /// Raw per-period covariance with no scaling.
    pub const fn per_period() -> Self {
        Self { annualization: 1.0 }
    }

    /// Scaling factor applied to the per-period estimate.
    pub const fn annualization(&self) -> f64 {
        self.annualization
    }
}

impl CovarianceEstimator for SampleCovarianceEstimator {
    fn estimate(&self, returns: &Array2<f64>) -> Result<Array2<f64>, CovarianceError> {
        let n_obs = returns.nrows();
        if n_obs < 2 {
            return Err(CovarianceError::InsufficientData {
                required: 2,
                actual: n_obs,
            });
        }

        let mean = returns
            .mean_axis(Axis(0))
            .ok_or(CovarianceError::InsufficientData {
                required: 2,
                actual: 0,
            })?;
        let centered = returns - &mean;
        let cov = centered.t().dot(&centered) * (self.annualization / (n_obs - 1) as f64);

        if cov.iter().any(|v| !v.is_finite()) {
            return Err(CovarianceError::NonFinite);
        }

        // Floating point accumulation can leave tiny asymmetries
        Ok(symmetrize(&cov))
    }
}
