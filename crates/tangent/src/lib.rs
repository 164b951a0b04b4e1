#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tangent/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod memory;
pub mod request;
pub mod result;
pub mod source;

pub use config::{EngineConfig, ExpectedReturnSource};
pub use engine::PortfolioEngine;
pub use error::{DataUnavailable, PortfolioError, Result};
pub use export::{ExportError, ExportFormat, Exporter};
pub use memory::InMemoryMarketData;
pub use request::{lookback_start, risk_ceiling};
pub use result::{MinimumVolatilityResult, OptimizationResult};
pub use source::{InstrumentMetadata, MarketDataSource};

// Types callers need to build requests and models
pub use tangent_optimize::{RiskCeiling, SolverConfig};
pub use tangent_risk::{ReturnModel, RiskFreeRate};
