//! Spectral projected gradient
//!
//! Minimizes a smooth objective over the capped simplex. Each iteration takes
//! a Barzilai-Borwein step, projects it back onto the constraint set, and
//! backtracks along the feasible direction with a non-monotone Armijo rule
//! (Birgin, Martínez & Raydan, 2000).

use crate::constraints::WeightBounds;
use crate::error::{Phase, Result, SolverError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Sufficient-decrease constant for the Armijo test.
const ARMIJO_GAMMA: f64 = 1e-4;
/// Number of past objective values the non-monotone test compares against.
const NONMONOTONE_MEMORY: usize = 10;
const MIN_STEP: f64 = 1e-12;
const MAX_STEP: f64 = 1e12;
const MIN_BACKTRACK: f64 = 1e-12;
/// A stalled line search counts as converged within this multiple of the tolerance.
const STALL_FACTOR: f64 = 1e3;

/// Smooth objective over a weight vector.
pub trait Objective {
    /// Objective value. May be `+∞` outside the objective's domain.
    fn value(&self, weights: &Array1<f64>) -> f64;

    /// Gradient at `weights`.
    fn gradient(&self, weights: &Array1<f64>) -> Array1<f64>;
}

/// Solver settings shared by both optimization phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Iteration cap for a single projected-gradient solve
    pub max_iterations: usize,
    /// Projected-gradient stationarity tolerance
    pub tolerance: f64,
    /// Allowed violation of the volatility ceiling (relative, on variance)
    pub constraint_tolerance: f64,
    /// Augmented Lagrangian outer iteration cap
    pub max_outer_iterations: usize,
    /// Wall-clock budget for one optimization request, `None` for unlimited
    pub time_budget_ms: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20_000,
            tolerance: 1e-10,
            constraint_tolerance: 1e-9,
            max_outer_iterations: 50,
            time_budget_ms: Some(10_000),
        }
    }
}

/// Wall-clock budget shared across the phases of one request.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    /// Start the clock.
    pub fn start(budget_ms: Option<u64>) -> Self {
        Self {
            start: Instant::now(),
            budget: budget_ms.map(Duration::from_millis),
        }
    }

    /// Time since the clock started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Whether the budget is used up.
    pub fn expired(&self) -> bool {
        self.budget.is_some_and(|budget| self.elapsed() >= budget)
    }

    /// Fail with [`SolverError::TimedOut`] once the budget is used up.
    pub fn check(&self, phase: Phase) -> Result<()> {
        match self.budget {
            Some(budget) if self.elapsed() >= budget => Err(SolverError::TimedOut {
                phase,
                budget_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
            }),
            _ => Ok(()),
        }
    }
}

/// Outcome of a projected-gradient solve.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Final iterate
    pub weights: Array1<f64>,
    /// Objective value at the final iterate
    pub value: f64,
    /// Iterations performed
    pub iterations: usize,
    /// Infinity norm of the projected gradient at the final iterate
    pub projected_gradient: f64,
    /// Whether the stationarity test passed
    pub converged: bool,
}

impl Solution {
    /// Turn a non-converged solution into [`SolverError::NotConverged`].
    pub fn require_converged(self, phase: Phase) -> Result<Self> {
        if self.converged {
            Ok(self)
        } else {
            Err(SolverError::NotConverged {
                phase,
                iterations: self.iterations,
            })
        }
    }
}

/// Spectral projected-gradient minimizer over [`WeightBounds`].
#[derive(Debug, Clone, Copy)]
pub struct ProjectedGradient<'a> {
    bounds: &'a WeightBounds,
    config: &'a SolverConfig,
    deadline: &'a Deadline,
    phase: Phase,
}

impl<'a> ProjectedGradient<'a> {
    /// Create a solver for one phase.
    pub const fn new(
        bounds: &'a WeightBounds,
        config: &'a SolverConfig,
        deadline: &'a Deadline,
        phase: Phase,
    ) -> Self {
        Self {
            bounds,
            config,
            deadline,
            phase,
        }
    }

    /// Minimize `objective` starting from `start` (projected first).
    ///
    /// Returns `Err` only for a non-finite objective/gradient or an expired
    /// deadline. Hitting the iteration cap yields a solution with
    /// `converged == false`.
    pub fn minimize<O: Objective>(&self, objective: &O, start: &Array1<f64>) -> Result<Solution> {
        let mut weights = self.bounds.project(start);
        let mut value = objective.value(&weights);
        let mut gradient = objective.gradient(&weights);
        self.ensure_finite(value, &gradient)?;

        let mut history: VecDeque<f64> = VecDeque::with_capacity(NONMONOTONE_MEMORY);
        history.push_back(value);

        let mut pg = self.projected_gradient_norm(&weights, &gradient);
        let mut step = if pg > 0.0 {
            (1.0 / pg).clamp(MIN_STEP, MAX_STEP)
        } else {
            1.0
        };

        for iteration in 0..self.config.max_iterations {
            if pg <= self.tolerance(&gradient) {
                return Ok(self.finish(weights, value, iteration, pg, true));
            }
            self.deadline.check(self.phase)?;

            let trial = self.bounds.project(&(&weights - &(&gradient * step)));
            let direction = trial - &weights;
            let slope = gradient.dot(&direction);
            let reference = history.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            let mut lambda = 1.0;
            let (candidate, candidate_value) = loop {
                let candidate = &weights + &(&direction * lambda);
                let candidate_value = objective.value(&candidate);
                if candidate_value.is_finite()
                    && candidate_value <= reference + ARMIJO_GAMMA * lambda * slope
                {
                    break (candidate, candidate_value);
                }
                lambda *= 0.5;
                if lambda < MIN_BACKTRACK {
                    let converged = pg <= STALL_FACTOR * self.tolerance(&gradient);
                    debug!(
                        phase = %self.phase,
                        iteration,
                        projected_gradient = pg,
                        converged,
                        "line search stalled"
                    );
                    return Ok(self.finish(weights, value, iteration, pg, converged));
                }
            };

            let candidate_gradient = objective.gradient(&candidate);
            self.ensure_finite(candidate_value, &candidate_gradient)?;

            let s = &candidate - &weights;
            let y = &candidate_gradient - &gradient;
            let sty = s.dot(&y);
            step = if sty > 0.0 {
                (s.dot(&s) / sty).clamp(MIN_STEP, MAX_STEP)
            } else {
                MAX_STEP
            };

            weights = candidate;
            value = candidate_value;
            gradient = candidate_gradient;
            pg = self.projected_gradient_norm(&weights, &gradient);

            if history.len() == NONMONOTONE_MEMORY {
                history.pop_front();
            }
            history.push_back(value);

            trace!(phase = %self.phase, iteration, value, projected_gradient = pg, step);
        }

        let converged = pg <= self.tolerance(&gradient);
        Ok(self.finish(
            weights,
            value,
            self.config.max_iterations,
            pg,
            converged,
        ))
    }

    /// ‖P(w - ∇f) - w‖∞, zero exactly at constrained stationary points.
    fn projected_gradient_norm(&self, weights: &Array1<f64>, gradient: &Array1<f64>) -> f64 {
        (self.bounds.project(&(weights - gradient)) - weights)
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    /// Stationarity tolerance, scaled up for steep objectives.
    fn tolerance(&self, gradient: &Array1<f64>) -> f64 {
        let scale = gradient.iter().fold(1.0_f64, |acc, g| acc.max(g.abs()));
        self.config.tolerance * scale
    }

    fn ensure_finite(&self, value: f64, gradient: &Array1<f64>) -> Result<()> {
        if value.is_finite() && gradient.iter().all(|g| g.is_finite()) {
            Ok(())
        } else {
            Err(SolverError::NonFinite { phase: self.phase })
        }
    }

    fn finish(
        &self,
        weights: Array1<f64>,
        value: f64,
        iterations: usize,
        projected_gradient: f64,
        converged: bool,
    ) -> Solution {
        debug!(
            phase = %self.phase,
            iterations,
            value,
            projected_gradient,
            converged,
            "projected gradient finished"
        );
        Solution {
            weights,
            value,
            iterations,
            projected_gradient,
            converged,
        }
    }
}
