//! In-memory market data.
//!
//! Serves fixed price series, betas and a risk-free rate. Used for offline
//! runs, replaying a snapshot and tests. Counts calls so callers can check
//! which fetches a request made.

use crate::error::DataUnavailable;
use crate::source::{InstrumentMetadata, MarketDataSource};
use chrono::NaiveDate;
use ndarray::{Array1, Array2};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tangent_risk::{PriceHistory, RiskFreeRate};

/// A snapshot of market data held in memory.
#[derive(Debug, Default)]
pub struct InMemoryMarketData {
    prices: HashMap<String, BTreeMap<NaiveDate, f64>>,
    betas: HashMap<String, f64>,
    risk_free_rate: Option<RiskFreeRate>,
    price_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
    rate_calls: AtomicUsize,
}

impl InMemoryMarketData {
    /// Empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the price series of a symbol.
    pub fn with_prices(
        mut self,
        symbol: impl Into<String>,
        prices: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Self {
        self.prices.insert(symbol.into(), prices.into_iter().collect());
        self
    }

    /// Set the beta of a symbol.
    pub fn with_beta(mut self, symbol: impl Into<String>, beta: f64) -> Self {
        self.betas.insert(symbol.into(), beta);
        self
    }

    /// Set the risk-free rate.
    pub const fn with_risk_free_rate(mut self, rate: RiskFreeRate) -> Self {
        self.risk_free_rate = Some(rate);
        self
    }

    /// Number of price requests served.
    pub fn price_calls(&self) -> usize {
        self.price_calls.load(Ordering::Relaxed)
    }

    /// Number of metadata requests served.
    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::Relaxed)
    }

    /// Number of risk-free rate requests served.
    pub fn rate_calls(&self) -> usize {
        self.rate_calls.load(Ordering::Relaxed)
    }

    fn series(&self, symbol: &str) -> Result<&BTreeMap<NaiveDate, f64>, DataUnavailable> {
        self.prices
            .get(symbol)
            .ok_or_else(|| DataUnavailable::new(symbol, "unknown ticker"))
    }

    fn history(
        &self,
        tickers: &[String],
        benchmark: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceHistory, DataUnavailable> {
        let mut series = tickers
            .iter()
            .map(|t| self.series(t))
            .collect::<Result<Vec<_>, _>>()?;
        let benchmark_series = benchmark.map(|b| self.series(b)).transpose()?;
        series.extend(benchmark_series);

        let in_window = |d: &NaiveDate| *d >= start && *d < end;
        let mut dates: BTreeSet<NaiveDate> = match series.first() {
            Some(first) => first.keys().copied().filter(in_window).collect(),
            None => BTreeSet::new(),
        };
        for s in series.iter().skip(1) {
            dates.retain(|d| s.contains_key(d));
        }
        let dates: Vec<NaiveDate> = dates.into_iter().collect();

        let value =
            |s: &BTreeMap<NaiveDate, f64>, d: &NaiveDate| s.get(d).copied().unwrap_or(f64::NAN);
        let mut closes = Array2::zeros((dates.len(), tickers.len()));
        for (j, s) in series.iter().take(tickers.len()).enumerate() {
            for (i, d) in dates.iter().enumerate() {
                closes[[i, j]] = value(s, d);
            }
        }

        let subject = tickers.join(",");
        let mut history = PriceHistory::new(dates.clone(), tickers.to_vec(), closes)
            .map_err(|e| DataUnavailable::new(subject.as_str(), e.to_string()))?;
        if let Some(b) = benchmark_series {
            let closes: Array1<f64> = dates.iter().map(|d| value(b, d)).collect();
            history = history
                .with_benchmark(closes)
                .map_err(|e| DataUnavailable::new(benchmark.unwrap_or_default(), e.to_string()))?;
        }
        Ok(history)
    }
}

impl MarketDataSource for InMemoryMarketData {
    async fn fetch_prices(
        &self,
        tickers: &[String],
        benchmark: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceHistory, DataUnavailable> {
        self.price_calls.fetch_add(1, Ordering::Relaxed);
        self.history(tickers, benchmark, start, end)
    }

    async fn fetch_metadata(
        &self,
        tickers: &[String],
    ) -> Result<HashMap<String, InstrumentMetadata>, DataUnavailable> {
        self.metadata_calls.fetch_add(1, Ordering::Relaxed);
        Ok(tickers
            .iter()
            .filter_map(|t| {
                self.betas
                    .get(t)
                    .map(|b| (t.clone(), InstrumentMetadata::with_beta(*b)))
            })
            .collect())
    }

    async fn fetch_risk_free_rate(&self) -> Result<RiskFreeRate, DataUnavailable> {
        self.rate_calls.fetch_add(1, Ordering::Relaxed);
        self.risk_free_rate
            .ok_or_else(|| DataUnavailable::new("risk-free rate", "no rate in snapshot"))
    }
}
