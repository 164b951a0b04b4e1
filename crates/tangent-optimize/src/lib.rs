#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tangent/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod constraints;
pub mod error;
pub mod lagrangian;
pub mod objectives;
pub mod solver;
pub mod two_phase;

pub use constraints::WeightBounds;
pub use error::{Phase, Result, SolverError};
pub use objectives::{NegativeSharpe, Variance};
pub use solver::{Deadline, Objective, ProjectedGradient, Solution, SolverConfig};
pub use two_phase::{
    MinimumVariance, RiskCeiling, TwoPhaseOptimizer, TwoPhaseOutcome, TwoPhaseSolution,
};
