#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tangent/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod capm;
pub mod covariance;
pub mod error;
pub mod model;
pub mod performance;
pub mod returns;

// Re-export main types
pub use capm::{CapmModel, DEFAULT_BETA, RiskFreeRate, capm_expected_return};
pub use covariance::{CovarianceEstimator, SampleCovarianceEstimator};
pub use error::{Result, RiskError};
pub use model::{ReturnModel, ReturnModelBuilder};
pub use performance::{
    MIN_VOLATILITY, PortfolioPerformance, performance, portfolio_variance, portfolio_volatility,
    sharpe_ratio,
};
pub use returns::{AssetReturns, PriceHistory, TRADING_DAYS_PER_YEAR};
