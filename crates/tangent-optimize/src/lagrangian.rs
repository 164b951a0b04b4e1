//! Augmented Lagrangian for the volatility ceiling
//!
//! The ceiling σ(w) ≤ R is written as the scaled inequality
//!
//! c(w) = wᵀΣw / R² - 1 ≤ 0
//!
//! and folded into the objective with the Powell-Hestenes-Rockafellar term
//!
//! L(w) = f(w) + (max(0, λ + ρc)² - λ²) / 2ρ
//!
//! Each outer iteration minimizes L over the capped simplex, then updates
//! λ ← max(0, λ + ρc). The penalty ρ grows tenfold whenever the violation
//! fails to shrink by a factor of four.

use crate::constraints::WeightBounds;
use crate::error::{Phase, Result, SolverError};
use crate::solver::{Deadline, Objective, ProjectedGradient, Solution, SolverConfig};
use ndarray::{Array1, Array2};
use tracing::{debug, warn};

const INITIAL_PENALTY: f64 = 10.0;
const MAX_PENALTY: f64 = 1e8;
const PENALTY_GROWTH: f64 = 10.0;
const REQUIRED_PROGRESS: f64 = 0.25;
const PULLBACK_STEPS: usize = 60;

/// Scaled variance ceiling wᵀΣw / R² - 1 ≤ 0.
#[derive(Debug, Clone, Copy)]
pub struct VarianceCeiling<'a> {
    covariance: &'a Array2<f64>,
    max_variance: f64,
}

impl<'a> VarianceCeiling<'a> {
    /// Ceiling on volatility `max_volatility` (must be positive).
    pub fn new(covariance: &'a Array2<f64>, max_volatility: f64) -> Self {
        Self {
            covariance,
            max_variance: max_volatility * max_volatility,
        }
    }

    /// Constraint value c(w); feasible when non-positive.
    pub fn value(&self, weights: &Array1<f64>) -> f64 {
        weights.dot(&self.covariance.dot(weights)) / self.max_variance - 1.0
    }

    /// Gradient 2Σw / R².
    pub fn gradient(&self, weights: &Array1<f64>) -> Array1<f64> {
        self.covariance.dot(weights) * (2.0 / self.max_variance)
    }
}

/// Objective augmented with the ceiling term for fixed (λ, ρ).
#[derive(Debug)]
struct Augmented<'a, O> {
    objective: &'a O,
    ceiling: &'a VarianceCeiling<'a>,
    multiplier: f64,
    penalty: f64,
}

impl<O: Objective> Objective for Augmented<'_, O> {
    fn value(&self, weights: &Array1<f64>) -> f64 {
        let shifted = (self.multiplier + self.penalty * self.ceiling.value(weights)).max(0.0);
        self.objective.value(weights)
            + (shifted * shifted - self.multiplier * self.multiplier) / (2.0 * self.penalty)
    }

    fn gradient(&self, weights: &Array1<f64>) -> Array1<f64> {
        let shifted = (self.multiplier + self.penalty * self.ceiling.value(weights)).max(0.0);
        let mut gradient = self.objective.gradient(weights);
        if shifted > 0.0 {
            gradient.scaled_add(shifted, &self.ceiling.gradient(weights));
        }
        gradient
    }
}

/// Result of an augmented Lagrangian solve.
#[derive(Debug, Clone)]
pub struct ConstrainedSolution {
    /// Final weights, feasible for the ceiling
    pub weights: Array1<f64>,
    /// Final multiplier estimate; positive when the ceiling binds
    pub multiplier: f64,
    /// Outer iterations performed
    pub outer_iterations: usize,
    /// Inner projected-gradient iterations across all outer iterations
    pub inner_iterations: usize,
}

impl ConstrainedSolution {
    /// Whether the ceiling is active at the solution.
    pub fn ceiling_binding(&self) -> bool {
        self.multiplier > 0.0
    }
}

/// Minimize `objective` over the capped simplex subject to a volatility ceiling.
///
/// `anchor` must satisfy the ceiling; it seeds the first inner solve and is
/// used to pull a marginally infeasible final iterate back inside.
pub fn minimize_with_ceiling<O: Objective>(
    objective: &O,
    ceiling: &VarianceCeiling<'_>,
    bounds: &WeightBounds,
    config: &SolverConfig,
    deadline: &Deadline,
    anchor: &Array1<f64>,
) -> Result<ConstrainedSolution> {
    let phase = Phase::MaximumSharpe;
    let solver = ProjectedGradient::new(bounds, config, deadline, phase);

    let mut weights = anchor.clone();
    let mut multiplier = 0.0_f64;
    let mut penalty = INITIAL_PENALTY;
    let mut previous_violation = f64::INFINITY;
    let mut inner_iterations = 0;
    let mut last: Option<Solution> = None;

    for outer in 0..config.max_outer_iterations {
        let augmented = Augmented {
            objective,
            ceiling,
            multiplier,
            penalty,
        };
        let solution = solver.minimize(&augmented, &weights)?;
        inner_iterations += solution.iterations;
        weights = solution.weights.clone();

        let constraint = ceiling.value(&weights);
        let violation = constraint.max(0.0);
        let updated = (multiplier + penalty * constraint).max(0.0);
        multiplier = updated;

        debug!(
            outer,
            constraint,
            multiplier,
            penalty,
            inner_converged = solution.converged,
            "augmented lagrangian step"
        );

        let complementary = multiplier == 0.0 || constraint.abs() <= config.constraint_tolerance;
        if solution.converged && violation <= config.constraint_tolerance && complementary {
            return Ok(ConstrainedSolution {
                weights: pull_inside(ceiling, anchor, weights),
                multiplier,
                outer_iterations: outer + 1,
                inner_iterations,
            });
        }

        if violation > REQUIRED_PROGRESS * previous_violation {
            penalty = (penalty * PENALTY_GROWTH).min(MAX_PENALTY);
        }
        previous_violation = violation;
        last = Some(solution);
    }

    match last {
        Some(solution)
            if solution.converged
                && ceiling.value(&solution.weights) <= config.constraint_tolerance =>
        {
            warn!(
                outer_iterations = config.max_outer_iterations,
                multiplier, "ceiling multiplier did not settle, keeping feasible iterate"
            );
            Ok(ConstrainedSolution {
                weights: pull_inside(ceiling, anchor, solution.weights),
                multiplier,
                outer_iterations: config.max_outer_iterations,
                inner_iterations,
            })
        }
        _ => Err(SolverError::NotConverged {
            phase,
            iterations: inner_iterations,
        }),
    }
}

/// Move a point that overshoots the ceiling by solver noise onto the segment
/// towards `anchor` until it is feasible. The segment stays in the simplex.
fn pull_inside(
    ceiling: &VarianceCeiling<'_>,
    anchor: &Array1<f64>,
    weights: Array1<f64>,
) -> Array1<f64> {
    if ceiling.value(&weights) <= 0.0 {
        return weights;
    }
    let blend = |t: f64| &weights + &((anchor - &weights) * t);

    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    for _ in 0..PULLBACK_STEPS {
        let mid = 0.5 * (lo + hi);
        if ceiling.value(&blend(mid)) <= 0.0 {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    blend(hi)
}
