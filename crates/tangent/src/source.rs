//! Market data seam.
//!
//! The engine never performs I/O itself; everything it needs comes through a
//! [`MarketDataSource`]. Caching and retries are the source's business.

use crate::error::{DataUnavailable, PortfolioError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use tangent_risk::{AssetReturns, PriceHistory, RiskFreeRate};

/// Per-instrument metadata used for pricing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMetadata {
    /// Market beta, if the source knows it
    pub beta: Option<f64>,
}

impl InstrumentMetadata {
    /// Metadata with a known beta.
    pub const fn with_beta(beta: f64) -> Self {
        Self { beta: Some(beta) }
    }
}

/// Provider of prices, instrument metadata and the risk-free rate.
pub trait MarketDataSource: Send + Sync {
    /// Adjusted closes for `tickers` (and the benchmark, if given) on the dates
    /// all of them share, within `[start, end)`.
    ///
    /// Column order follows `tickers`. An unknown ticker or an unreachable
    /// source is a [`DataUnavailable`].
    fn fetch_prices(
        &self,
        tickers: &[String],
        benchmark: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<PriceHistory, DataUnavailable>> + Send;

    /// Metadata keyed by ticker. Tickers the source knows nothing about may be
    /// absent from the map.
    fn fetch_metadata(
        &self,
        tickers: &[String],
    ) -> impl Future<Output = Result<HashMap<String, InstrumentMetadata>, DataUnavailable>> + Send;

    /// Current annualized risk-free rate as a fraction.
    fn fetch_risk_free_rate(
        &self,
    ) -> impl Future<Output = Result<RiskFreeRate, DataUnavailable>> + Send;

    /// Daily returns for `tickers` (and the benchmark) over `[start, end)`.
    fn fetch_returns(
        &self,
        tickers: &[String],
        benchmark: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<AssetReturns, PortfolioError>> + Send {
        async move {
            let prices = self.fetch_prices(tickers, benchmark, start, end).await?;
            Ok(prices.returns()?)
        }
    }
}
