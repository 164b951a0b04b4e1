//! Weight constraints
//!
//! Long-only, fully invested, per-asset capped weights:
//!
//! C = { w ∈ ℝⁿ : Σ wᵢ = 1, 0 ≤ wᵢ ≤ cap }
//!
//! The Euclidean projection onto C is wᵢ = clamp(vᵢ - τ, 0, cap) where τ is the
//! unique shift making the weights sum to one. Σ clamp(vᵢ - τ, 0, cap) is
//! non-increasing in τ, so τ is found by bisection.

use crate::error::{Result, SolverError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Slack allowed when checking that `cap × n` reaches one.
const CAPACITY_SLACK: f64 = 1e-12;

const BISECTION_STEPS: usize = 200;

/// Box and budget constraints on a weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightBounds {
    n_assets: usize,
    max_weight: f64,
}

impl WeightBounds {
    /// Create bounds for `n_assets` instruments with a per-asset cap.
    ///
    /// Caps above one are equivalent to one. Fails when there are no assets,
    /// the cap is not positive, or `max_weight × n_assets < 1`.
    pub fn new(n_assets: usize, max_weight: f64) -> Result<Self> {
        if n_assets == 0 {
            return Err(SolverError::Infeasible("no assets".to_string()));
        }
        if !max_weight.is_finite() || max_weight <= 0.0 {
            return Err(SolverError::Infeasible(format!(
                "max weight must be positive, got {}",
                max_weight
            )));
        }
        let max_weight = max_weight.min(1.0);
        if max_weight * (n_assets as f64) < 1.0 - CAPACITY_SLACK {
            return Err(SolverError::Infeasible(format!(
                "{} assets capped at {} cannot sum to 1",
                n_assets, max_weight
            )));
        }
        Ok(Self {
            n_assets,
            max_weight,
        })
    }

    /// Number of assets.
    pub const fn n_assets(&self) -> usize {
        self.n_assets
    }

    /// Effective per-asset cap (at most one).
    pub const fn max_weight(&self) -> f64 {
        self.max_weight
    }

    /// Equal weighting 1/n, projected so it respects the cap.
    pub fn equal_weights(&self) -> Array1<f64> {
        self.project(&Array1::from_elem(
            self.n_assets,
            1.0 / self.n_assets as f64,
        ))
    }

    /// Check a weight vector against the constraints.
    pub fn is_feasible(&self, weights: &Array1<f64>, tolerance: f64) -> bool {
        weights.len() == self.n_assets
            && (weights.sum() - 1.0).abs() <= tolerance
            && weights
                .iter()
                .all(|&w| w >= -tolerance && w <= self.max_weight + tolerance)
    }

    /// Euclidean projection onto the capped simplex.
    pub fn project(&self, point: &Array1<f64>) -> Array1<f64> {
        let cap = self.max_weight;
        let filled = |tau: f64| -> f64 { point.iter().map(|&v| (v - tau).clamp(0.0, cap)).sum() };

        // At `lo` every weight sits at the cap (sum ≥ 1); at `hi` every weight is zero
        let (mut lo, mut hi) = point
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        lo -= cap;

        for _ in 0..BISECTION_STEPS {
            let mid = 0.5 * (lo + hi);
            if mid <= lo || mid >= hi {
                break;
            }
            if filled(mid) > 1.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let tau = if (filled(lo) - 1.0).abs() <= (filled(hi) - 1.0).abs() {
            lo
        } else {
            hi
        };
        point.mapv(|v| (v - tau).clamp(0.0, cap))
    }
}
