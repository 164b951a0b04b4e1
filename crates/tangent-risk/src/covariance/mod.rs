//! Annualized covariance of daily returns.
//!
//! The return model builder is generic over [`CovarianceEstimator`]; the
//! default is the sample estimator scaled by trading days per year. The
//! helpers in [`utils`] check that an estimate is usable as a quadratic form.

pub mod sample;
pub mod utils;

pub use sample::SampleCovarianceEstimator;
pub use utils::{
    EigenDecomposition, is_positive_semidefinite, is_symmetric, jacobi_eigendecomp, symmetrize,
};

use ndarray::Array2;
use thiserror::Error;

/// Why a covariance estimate was rejected
#[derive(Debug, Error)]
pub enum CovarianceError {
    /// Fewer return rows than the estimator needs
    #[error("need at least {required} return observations, got {actual}")]
    InsufficientData {
        /// Minimum number of rows
        required: usize,
        /// Rows supplied
        actual: usize,
    },

    /// Some portfolio would have negative variance
    #[error("covariance has a negative eigenvalue ({min_eigenvalue})")]
    NotPositiveSemidefinite {
        /// Smallest eigenvalue
        min_eigenvalue: f64,
    },

    /// `cov[i][j] != cov[j][i]` beyond tolerance
    #[error("covariance is not symmetric")]
    NotSymmetric,

    /// Matrix is not square, or does not match the instrument count
    #[error("covariance is {actual} wide, expected {expected}")]
    DimensionMismatch {
        /// Instruments expected
        expected: usize,
        /// Size found
        actual: usize,
    },

    /// NaN or infinite entry
    #[error("covariance contains non-finite values")]
    NonFinite,
}

/// Turns a `T x N` matrix of daily returns (one row per day) into an
/// annualized `N x N` covariance.
pub trait CovarianceEstimator {
    /// Estimate the annualized covariance of the columns of `returns`.
    fn estimate(&self, returns: &Array2<f64>) -> Result<Array2<f64>, CovarianceError>;
}
