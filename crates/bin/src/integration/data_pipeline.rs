//! Yahoo Finance market data for the portfolio engine.
//!
//! Daily quotes come from the SQLite cache when it covers the requested
//! window and from Yahoo otherwise; fresh quotes are written back. The
//! risk-free rate and instrument profiles are kept in short-lived memory
//! caches keyed by symbol.

use super::cache_manager;
use chrono::NaiveDate;
use futures::future::{join_all, try_join_all};
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::time::Duration;
use tangent::{DataUnavailable, InstrumentMetadata, MarketDataSource};
use tangent_data::{
    AlignedCloses, DataError, InstrumentProfile, SqliteCache, TtlCache, YahooQuoteProvider,
    YahooSummaryProvider, align_closes,
};
use tangent_risk::{PriceHistory, RiskFreeRate};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Lifetime of a cached risk-free rate.
const RATE_TTL: Duration = Duration::from_secs(60 * 60);
/// Lifetime of a cached instrument profile.
const PROFILE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for data fetching.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FetchConfig {
    /// Whether to use the quote cache.
    pub(crate) use_cache: bool,
    /// Whether to refetch quotes even when cached.
    pub(crate) force_refresh: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            force_refresh: false,
        }
    }
}

/// Market data backed by Yahoo Finance and the local quote cache.
#[derive(Debug)]
pub(crate) struct YahooMarketData {
    quotes: YahooQuoteProvider,
    summaries: YahooSummaryProvider,
    cache: Option<Mutex<SqliteCache>>,
    config: FetchConfig,
    risk_free_symbol: String,
    rates: TtlCache<String, f64>,
    profiles: TtlCache<String, InstrumentProfile>,
}

impl YahooMarketData {
    /// Create the data source. A cache that cannot be opened is skipped with a warning.
    pub(crate) fn new(config: FetchConfig, risk_free_symbol: &str) -> Result<Self, DataError> {
        let cache = if config.use_cache {
            match cache_manager::open_cache() {
                Ok(cache) => Some(Mutex::new(cache)),
                Err(e) => {
                    warn!(error = %e, "quote cache unavailable, fetching everything");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            quotes: YahooQuoteProvider::new()?,
            summaries: YahooSummaryProvider::new()?,
            cache,
            config,
            risk_free_symbol: risk_free_symbol.to_string(),
            rates: TtlCache::new(RATE_TTL),
            profiles: TtlCache::new(PROFILE_TTL),
        })
    }

    /// Profile of one instrument, served from memory when fresh.
    pub(crate) async fn profile(&self, symbol: &str) -> Result<InstrumentProfile, DataError> {
        let key = symbol.to_string();
        if let Some(profile) = self.profiles.get(&key) {
            debug!(symbol, "profile cache hit");
            return Ok(profile);
        }
        let profile = self.summaries.fetch_profile(symbol).await?;
        self.profiles.insert(key, profile.clone());
        Ok(profile)
    }

    async fn cached_quotes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<DataFrame> {
        if self.config.force_refresh {
            return None;
        }
        let cache = self.cache.as_ref()?.lock().await;
        if cache.has_quotes(symbol, start, end).unwrap_or(false)
            && let Ok(df) = cache.get_quotes(symbol, start, end)
        {
            debug!(symbol, rows = df.height(), "quote cache hit");
            return Some(df);
        }
        None
    }

    /// Quotes for one symbol over `[start, end)`.
    async fn quotes_for(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame, DataUnavailable> {
        if let Some(df) = self.cached_quotes(symbol, start, end).await {
            return Ok(df);
        }

        let df = self
            .quotes
            .fetch_quotes(symbol, start, end)
            .await
            .map_err(|e| unavailable(symbol, &e))?;

        if let Some(cache) = &self.cache
            && let Err(e) = cache.lock().await.put_quotes(&df)
        {
            warn!(symbol, error = %e, "failed to cache quotes");
        }
        Ok(df)
    }
}

fn unavailable(subject: &str, err: &DataError) -> DataUnavailable {
    let reason = if err.is_missing() {
        format!("unknown ticker or no prices ({})", err)
    } else {
        err.to_string()
    };
    DataUnavailable::new(subject, reason)
}

/// Convert date-aligned closes into a validated price history.
pub(crate) fn price_history(aligned: AlignedCloses) -> Result<PriceHistory, DataUnavailable> {
    let subject = aligned.symbols.join(",");
    let history = PriceHistory::new(aligned.dates, aligned.symbols, aligned.closes)
        .map_err(|e| DataUnavailable::new(subject.as_str(), e.to_string()))?;
    match aligned.benchmark {
        Some(benchmark) => history
            .with_benchmark(benchmark)
            .map_err(|e| DataUnavailable::new("benchmark", e.to_string())),
        None => Ok(history),
    }
}

impl MarketDataSource for YahooMarketData {
    async fn fetch_prices(
        &self,
        tickers: &[String],
        benchmark: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceHistory, DataUnavailable> {
        let frames = try_join_all(tickers.iter().map(|symbol| async move {
            let df = self.quotes_for(symbol, start, end).await?;
            Ok::<_, DataUnavailable>((symbol.clone(), df))
        }))
        .await?;
        let benchmark_frame = match benchmark {
            Some(symbol) => Some(self.quotes_for(symbol, start, end).await?),
            None => None,
        };

        let aligned = align_closes(&frames, benchmark_frame.as_ref())
            .map_err(|e| DataUnavailable::new(tickers.join(","), e.to_string()))?;
        debug!(
            tickers = tickers.len(),
            dates = aligned.dates.len(),
            "aligned price history"
        );
        price_history(aligned)
    }

    async fn fetch_metadata(
        &self,
        tickers: &[String],
    ) -> Result<HashMap<String, InstrumentMetadata>, DataUnavailable> {
        let profiles = join_all(tickers.iter().map(|symbol| self.profile(symbol))).await;

        let mut metadata = HashMap::with_capacity(tickers.len());
        for (symbol, profile) in tickers.iter().zip(profiles) {
            match profile {
                Ok(profile) => {
                    metadata.insert(symbol.clone(), InstrumentMetadata { beta: profile.beta });
                }
                Err(e) => warn!(symbol = %symbol, error = %e, "no profile, beta unknown"),
            }
        }
        Ok(metadata)
    }

    async fn fetch_risk_free_rate(&self) -> Result<RiskFreeRate, DataUnavailable> {
        let symbol = &self.risk_free_symbol;
        let percent = match self.rates.get(symbol) {
            Some(percent) => percent,
            None => {
                let percent = self
                    .quotes
                    .fetch_latest_close(symbol)
                    .await
                    .map_err(|e| unavailable(symbol, &e))?;
                self.rates.insert(symbol.clone(), percent);
                percent
            }
        };
        RiskFreeRate::from_percent(percent)
            .map_err(|e| DataUnavailable::new(symbol.as_str(), e.to_string()))
    }
}
