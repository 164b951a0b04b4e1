//! End-to-end requests against an in-memory market snapshot.

use approx::assert_abs_diff_eq;
use chrono::{Datelike, NaiveDate};
use rstest::{fixture, rstest};
use std::collections::HashMap;
use tangent::{
    DataUnavailable, EngineConfig, ExpectedReturnSource, InMemoryMarketData, InstrumentMetadata,
    MarketDataSource, PortfolioEngine, RiskCeiling, RiskFreeRate,
};
use tangent_risk::PriceHistory;

const TICKERS: [&str; 3] = ["AAA", "BBB", "CCC"];

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn query_date() -> NaiveDate {
    day(2024, 6, 14)
}

fn tickers(symbols: &[&str]) -> Vec<String> {
    symbols.iter().map(|s| s.to_string()).collect()
}

fn trading_days() -> Vec<NaiveDate> {
    day(2019, 6, 14)
        .iter_days()
        .take_while(|d| *d < query_date())
        .filter(|d| d.weekday().number_from_monday() <= 5)
        .collect()
}

fn market_return(t: f64) -> f64 {
    0.0004 + 0.008 * (0.7 * t).sin()
}

/// Prices compounding `return_at(t)` from 100.
fn compound(dates: &[NaiveDate], return_at: impl Fn(f64) -> f64) -> Vec<(NaiveDate, f64)> {
    let mut price = 100.0;
    dates
        .iter()
        .enumerate()
        .map(|(t, d)| {
            if t > 0 {
                price *= 1.0 + return_at(t as f64);
            }
            (*d, price)
        })
        .collect()
}

/// Three stocks driven by a common market factor plus distinct cycles.
#[fixture]
fn snapshot() -> InMemoryMarketData {
    let dates = trading_days();
    // (drift, beta, idiosyncratic amplitude, frequency)
    let stocks = [
        (0.0002, 0.8, 0.006, 0.31),
        (0.0001, 1.2, 0.009, 0.53),
        (0.0003, 1.5, 0.012, 0.97),
    ];

    let mut data = InMemoryMarketData::new()
        .with_prices("SPY", compound(&dates, market_return))
        .with_risk_free_rate(RiskFreeRate::from_fraction(0.04).unwrap());
    for (symbol, (drift, beta, amplitude, frequency)) in TICKERS.iter().zip(stocks) {
        data = data
            .with_prices(
                *symbol,
                compound(&dates, |t| {
                    drift + beta * market_return(t) + amplitude * (frequency * t + 1.0).sin()
                }),
            )
            .with_beta(*symbol, beta);
    }
    data
}

fn engine(data: InMemoryMarketData) -> PortfolioEngine<InMemoryMarketData> {
    PortfolioEngine::new(data, EngineConfig::default())
}

#[rstest]
#[tokio::test]
async fn capm_optimization_is_a_valid_allocation(snapshot: InMemoryMarketData) {
    let engine = engine(snapshot);
    let result = engine
        .optimize_portfolio(&tickers(&TICKERS), query_date(), 0.6, RiskCeiling::Unbounded)
        .await
        .unwrap();

    assert_eq!(result.tickers, tickers(&TICKERS));
    assert_eq!(result.expected_return_source, ExpectedReturnSource::Capm);
    assert_abs_diff_eq!(result.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    assert!(result.weights.iter().all(|w| *w >= 0.0 && *w <= 0.6 + 1e-9));
    assert!(result.min_volatility <= result.volatility + 1e-6);
    assert!(!result.risk_ceiling_infeasible);
    assert!(!result.risk_ceiling_active);

    let implied = (result.expected_return - result.risk_free_rate) / result.volatility;
    assert!((result.sharpe_ratio - implied).abs() < 1e-6);

    let source = engine.source();
    assert_eq!(source.price_calls(), 1);
    assert_eq!(source.metadata_calls(), 1);
    assert_eq!(source.rate_calls(), 1);
}

#[rstest]
#[tokio::test]
async fn historical_model_skips_metadata(snapshot: InMemoryMarketData) {
    let engine = engine(snapshot);
    let result = engine
        .optimize_portfolio_with(
            &tickers(&TICKERS),
            query_date(),
            1.0,
            RiskCeiling::Unbounded,
            ExpectedReturnSource::HistoricalMean,
        )
        .await
        .unwrap();

    assert_eq!(
        result.expected_return_source,
        ExpectedReturnSource::HistoricalMean
    );
    assert_abs_diff_eq!(result.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    assert_eq!(engine.source().metadata_calls(), 0);
}

#[rstest]
#[tokio::test]
async fn minimum_volatility_fetches_prices_only(snapshot: InMemoryMarketData) {
    let engine = engine(snapshot);
    let result = engine
        .minimum_volatility_portfolio(&tickers(&TICKERS), query_date(), 0.5)
        .await
        .unwrap();

    assert_abs_diff_eq!(result.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    assert!(result.weights.iter().all(|w| *w <= 0.5 + 1e-9));
    assert!(result.min_volatility > 0.0);
    assert_eq!(engine.source().metadata_calls(), 0);
    assert_eq!(engine.source().rate_calls(), 0);
}

#[rstest]
#[tokio::test]
async fn minimum_volatility_matches_full_optimization(snapshot: InMemoryMarketData) {
    let engine = engine(snapshot);
    let symbols = tickers(&TICKERS);
    let minimum = engine
        .minimum_volatility_portfolio(&symbols, query_date(), 0.6)
        .await
        .unwrap();
    let full = engine
        .optimize_portfolio(&symbols, query_date(), 0.6, RiskCeiling::Unbounded)
        .await
        .unwrap();

    assert_abs_diff_eq!(minimum.min_volatility, full.min_volatility, epsilon = 1e-6);
}

#[rstest]
#[tokio::test]
async fn ceiling_below_minimum_returns_minimum_volatility_weights(
    snapshot: InMemoryMarketData,
) {
    let engine = engine(snapshot);
    let result = engine
        .optimize_portfolio(&tickers(&TICKERS), query_date(), 1.0, RiskCeiling::AtMost(0.01))
        .await
        .unwrap();

    assert!(result.risk_ceiling_infeasible);
    assert!(result.volatility > 0.01);
    assert_eq!(result.volatility, result.min_volatility);
}

#[rstest]
#[tokio::test]
async fn infeasible_caps_fail_before_any_fetch(snapshot: InMemoryMarketData) {
    let engine = engine(snapshot);
    let four = tickers(&["AAA", "BBB", "CCC", "SPY"]);

    let err = engine
        .optimize_portfolio(&four, query_date(), 0.2, RiskCeiling::Unbounded)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "infeasible_constraints");

    let err = engine
        .minimum_volatility_portfolio(&four, query_date(), 0.2)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "infeasible_constraints");

    assert_eq!(engine.source().price_calls(), 0);
}

#[rstest]
#[tokio::test]
async fn unknown_ticker_is_data_unavailable(snapshot: InMemoryMarketData) {
    let engine = engine(snapshot);
    let err = engine
        .optimize_portfolio(
            &tickers(&["AAA", "ZZZZ"]),
            query_date(),
            1.0,
            RiskCeiling::Unbounded,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "data_unavailable");
    assert!(err.to_string().contains("ZZZZ"));
}

#[rstest]
#[tokio::test]
async fn short_history_is_insufficient(snapshot: InMemoryMarketData) {
    let engine = engine(snapshot);
    // Only 2019-06-14 and 2019-06-17 precede the query date
    let err = engine
        .minimum_volatility_portfolio(&tickers(&TICKERS), day(2019, 6, 18), 1.0)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "insufficient_data");
}

#[rstest]
#[tokio::test]
async fn repeated_requests_agree(snapshot: InMemoryMarketData) {
    let engine = engine(snapshot);
    let symbols = tickers(&TICKERS);
    let first = engine
        .optimize_portfolio(&symbols, query_date(), 0.5, RiskCeiling::AtMost(0.3))
        .await
        .unwrap();
    let second = engine
        .optimize_portfolio(&symbols, query_date(), 0.5, RiskCeiling::AtMost(0.3))
        .await
        .unwrap();

    for (a, b) in first.weights.iter().zip(&second.weights) {
        assert!((a - b).abs() < 1e-4);
    }
}

#[rstest]
#[tokio::test]
async fn single_instrument_takes_everything(snapshot: InMemoryMarketData) {
    let engine = engine(snapshot);
    let result = engine
        .optimize_portfolio(&tickers(&["BBB"]), query_date(), 1.0, RiskCeiling::AtMost(0.05))
        .await
        .unwrap();

    assert_eq!(result.weights, vec![1.0]);
    assert_eq!(result.volatility, result.min_volatility);
}

/// Delegates to a snapshot but cannot serve metadata.
struct NoMetadata(InMemoryMarketData);

impl MarketDataSource for NoMetadata {
    async fn fetch_prices(
        &self,
        tickers: &[String],
        benchmark: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceHistory, DataUnavailable> {
        self.0.fetch_prices(tickers, benchmark, start, end).await
    }

    async fn fetch_metadata(
        &self,
        _tickers: &[String],
    ) -> Result<HashMap<String, InstrumentMetadata>, DataUnavailable> {
        Err(DataUnavailable::new("metadata", "service down"))
    }

    async fn fetch_risk_free_rate(&self) -> Result<RiskFreeRate, DataUnavailable> {
        self.0.fetch_risk_free_rate().await
    }
}

#[rstest]
#[tokio::test]
async fn metadata_outage_falls_back_to_unit_beta(snapshot: InMemoryMarketData) {
    let engine = PortfolioEngine::new(NoMetadata(snapshot), EngineConfig::default());
    let result = engine
        .optimize_portfolio(&tickers(&TICKERS), query_date(), 0.6, RiskCeiling::Unbounded)
        .await
        .unwrap();

    // Every beta at 1.0 prices all stocks alike, so the best Sharpe is at minimum volatility
    assert_abs_diff_eq!(result.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.volatility, result.min_volatility, epsilon = 1e-4);
}
