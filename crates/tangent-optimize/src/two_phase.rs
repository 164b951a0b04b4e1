//! Two-phase optimizer
//!
//! Phase 1 finds the minimum-variance portfolio under the weight bounds. If a
//! volatility ceiling is set below the achievable minimum, Phase 1's weights are
//! the answer. Otherwise Phase 2 maximizes the Sharpe ratio under the ceiling,
//! starting from the Phase-1 weights.

use crate::constraints::WeightBounds;
use crate::error::{Phase, Result, SolverError};
use crate::lagrangian::{VarianceCeiling, minimize_with_ceiling};
use crate::objectives::{NegativeSharpe, Variance};
use crate::solver::{Deadline, ProjectedGradient, SolverConfig};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tangent_risk::{
    MIN_VOLATILITY, ReturnModel, RiskError, RiskFreeRate, model::validate_covariance,
    portfolio_volatility,
};
use tracing::{info, warn};

/// Upper bound on portfolio volatility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCeiling {
    /// No ceiling
    Unbounded,
    /// Annualized volatility must not exceed the value
    AtMost(f64),
}

impl RiskCeiling {
    /// Ceiling from a caller-supplied `max_risk`, where zero means "no ceiling".
    ///
    /// Negative or non-finite values are rejected.
    pub fn from_max_risk(max_risk: f64) -> Result<Self> {
        if !max_risk.is_finite() || max_risk < 0.0 {
            return Err(SolverError::Infeasible(format!(
                "risk ceiling must be a non-negative number, got {}",
                max_risk
            )));
        }
        if max_risk == 0.0 {
            Ok(Self::Unbounded)
        } else {
            Ok(Self::AtMost(max_risk))
        }
    }

    /// The ceiling value, if any.
    pub const fn limit(&self) -> Option<f64> {
        match self {
            Self::Unbounded => None,
            Self::AtMost(max) => Some(*max),
        }
    }
}

/// How Phase 2 concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoPhaseOutcome {
    /// Sharpe maximized; `ceiling_active` is true when the ceiling binds
    MaximumSharpe {
        /// The volatility ceiling is active at the optimum
        ceiling_active: bool,
    },
    /// Ceiling below the minimum achievable volatility; Phase-1 weights returned
    CeilingInfeasible,
}

/// Phase-1 result.
#[derive(Debug, Clone)]
pub struct MinimumVariance {
    /// Minimum-variance weights
    pub weights: Array1<f64>,
    /// Volatility of those weights
    pub volatility: f64,
}

/// Full two-phase result.
#[derive(Debug, Clone)]
pub struct TwoPhaseSolution {
    /// Final weights
    pub weights: Array1<f64>,
    /// Phase-1 result
    pub minimum_variance: MinimumVariance,
    /// How the optimization concluded
    pub outcome: TwoPhaseOutcome,
}

impl TwoPhaseSolution {
    /// Whether Phase-1 weights were returned because the ceiling was infeasible.
    pub const fn fell_back(&self) -> bool {
        matches!(self.outcome, TwoPhaseOutcome::CeilingInfeasible)
    }

    /// Whether the maximum-Sharpe weights sit on the volatility ceiling.
    pub const fn ceiling_active(&self) -> bool {
        matches!(
            self.outcome,
            TwoPhaseOutcome::MaximumSharpe {
                ceiling_active: true
            }
        )
    }
}

/// Minimum-variance then maximum-Sharpe optimizer.
#[derive(Debug, Clone, Default)]
pub struct TwoPhaseOptimizer {
    config: SolverConfig,
}

impl TwoPhaseOptimizer {
    /// Optimizer with the given solver settings.
    pub const fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Solver settings.
    pub const fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Phase 1 alone: minimum-variance weights under the per-asset cap.
    pub fn minimum_variance(
        &self,
        covariance: &Array2<f64>,
        max_weight: f64,
    ) -> Result<MinimumVariance> {
        let deadline = Deadline::start(self.config.time_budget_ms);
        let bounds = WeightBounds::new(covariance.nrows(), max_weight)?;
        validate_covariance(covariance, bounds.n_assets())?;
        self.phase_one(covariance, &bounds, &deadline)
    }

    /// Both phases against a return model.
    ///
    /// # Arguments
    /// * `model` - Expected returns and covariance
    /// * `risk_free_rate` - Rate the Sharpe ratio is measured against
    /// * `max_weight` - Per-asset weight cap
    /// * `ceiling` - Volatility ceiling
    pub fn optimize(
        &self,
        model: &ReturnModel,
        risk_free_rate: RiskFreeRate,
        max_weight: f64,
        ceiling: RiskCeiling,
    ) -> Result<TwoPhaseSolution> {
        let deadline = Deadline::start(self.config.time_budget_ms);
        let bounds = WeightBounds::new(model.n_assets(), max_weight)?;
        let covariance = model.covariance();

        let minimum_variance = self.phase_one(covariance, &bounds, &deadline)?;
        if minimum_variance.volatility < MIN_VOLATILITY {
            return Err(RiskError::ZeroVolatility.into());
        }

        if let Some(max) = ceiling.limit()
            && minimum_variance.volatility > max
        {
            warn!(
                ceiling = max,
                min_volatility = minimum_variance.volatility,
                "risk ceiling below minimum achievable volatility, returning minimum-variance weights"
            );
            return Ok(TwoPhaseSolution {
                weights: minimum_variance.weights.clone(),
                minimum_variance,
                outcome: TwoPhaseOutcome::CeilingInfeasible,
            });
        }

        let objective =
            NegativeSharpe::new(model.expected_returns(), covariance, risk_free_rate.value());
        let (weights, ceiling_active) = match ceiling.limit() {
            Some(max) => {
                let constrained = minimize_with_ceiling(
                    &objective,
                    &VarianceCeiling::new(covariance, max),
                    &bounds,
                    &self.config,
                    &deadline,
                    &minimum_variance.weights,
                )?;
                let active = constrained.ceiling_binding();
                (constrained.weights, active)
            }
            None => {
                let solution =
                    ProjectedGradient::new(&bounds, &self.config, &deadline, Phase::MaximumSharpe)
                        .minimize(&objective, &minimum_variance.weights)?
                        .require_converged(Phase::MaximumSharpe)?;
                (solution.weights, false)
            }
        };

        info!(
            phase = %Phase::MaximumSharpe,
            ceiling_active,
            elapsed_ms = u64::try_from(deadline.elapsed().as_millis()).unwrap_or(u64::MAX),
            "optimization finished"
        );

        Ok(TwoPhaseSolution {
            weights,
            minimum_variance,
            outcome: TwoPhaseOutcome::MaximumSharpe { ceiling_active },
        })
    }

    fn phase_one(
        &self,
        covariance: &Array2<f64>,
        bounds: &WeightBounds,
        deadline: &Deadline,
    ) -> Result<MinimumVariance> {
        let solution =
            ProjectedGradient::new(bounds, &self.config, deadline, Phase::MinimumVariance)
                .minimize(&Variance::new(covariance), &bounds.equal_weights())?
                .require_converged(Phase::MinimumVariance)?;
        let volatility = portfolio_volatility(&solution.weights, covariance)?;

        info!(
            phase = %Phase::MinimumVariance,
            iterations = solution.iterations,
            volatility,
            "minimum variance found"
        );

        Ok(MinimumVariance {
            weights: solution.weights,
            volatility,
        })
    }
}
