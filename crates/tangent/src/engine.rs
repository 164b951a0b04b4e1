//! Portfolio engine
//!
//! Fetches the inputs of a request from a [`MarketDataSource`], builds the
//! return model and runs the two-phase optimizer. Nothing is retried and no
//! state is kept between requests; one engine serves concurrent requests.

use crate::config::{EngineConfig, ExpectedReturnSource};
use crate::error::{PortfolioError, Result};
use crate::request::{lookback_start, validate_allocation, validate_ceiling};
use crate::result::{MinimumVolatilityResult, OptimizationResult, display_weights, round_to};
use crate::source::MarketDataSource;
use chrono::NaiveDate;
use ndarray::Array2;
use std::collections::HashMap;
use tangent_optimize::{RiskCeiling, TwoPhaseOptimizer};
use tangent_risk::{
    CapmModel, ReturnModel, ReturnModelBuilder, RiskFreeRate, performance, sharpe_ratio,
};
use tracing::{debug, info, warn};

/// Entry point for portfolio requests.
#[derive(Debug)]
pub struct PortfolioEngine<S> {
    source: S,
    config: EngineConfig,
    optimizer: TwoPhaseOptimizer,
    builder: ReturnModelBuilder,
}

impl<S: MarketDataSource> PortfolioEngine<S> {
    /// Create an engine over a data source.
    pub fn new(source: S, config: EngineConfig) -> Self {
        Self {
            source,
            optimizer: TwoPhaseOptimizer::new(config.solver.clone()),
            builder: ReturnModelBuilder::new(),
            config,
        }
    }

    /// The data source.
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// The configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Maximum-Sharpe portfolio using the configured expected-return model.
    ///
    /// # Arguments
    /// * `tickers` - Instruments, in the order results are reported
    /// * `date` - Query date; history ends the day before
    /// * `max_weight` - Per-asset cap
    /// * `ceiling` - Volatility ceiling
    pub async fn optimize_portfolio(
        &self,
        tickers: &[String],
        date: NaiveDate,
        max_weight: f64,
        ceiling: RiskCeiling,
    ) -> Result<OptimizationResult> {
        self.optimize_portfolio_with(
            tickers,
            date,
            max_weight,
            ceiling,
            self.config.expected_returns,
        )
        .await
    }

    /// Maximum-Sharpe portfolio with an explicit expected-return model.
    pub async fn optimize_portfolio_with(
        &self,
        tickers: &[String],
        date: NaiveDate,
        max_weight: f64,
        ceiling: RiskCeiling,
        expected_returns: ExpectedReturnSource,
    ) -> Result<OptimizationResult> {
        validate_allocation(tickers, max_weight)?;
        validate_ceiling(ceiling)?;
        let start = lookback_start(date, self.config.lookback_years)?;

        info!(
            tickers = tickers.len(),
            %start,
            end = %date,
            model = %expected_returns,
            "optimizing portfolio"
        );

        let (model, risk_free_rate) = match expected_returns {
            ExpectedReturnSource::Capm => {
                let benchmark = Some(self.config.benchmark.as_str());
                let (returns, risk_free_rate, betas) = futures::try_join!(
                    self.source.fetch_returns(tickers, benchmark, start, date),
                    self.risk_free_rate(),
                    self.betas(tickers),
                )?;
                let market_return = self.builder.market_return(&returns)?;
                let capm = CapmModel::new(risk_free_rate, market_return)?;
                debug!(
                    market_return,
                    risk_free_rate = risk_free_rate.value(),
                    "capm inputs"
                );
                (self.builder.capm(&returns, &capm, &betas)?, risk_free_rate)
            }
            ExpectedReturnSource::HistoricalMean => {
                let (returns, risk_free_rate) = futures::try_join!(
                    self.source.fetch_returns(tickers, None, start, date),
                    self.risk_free_rate(),
                )?;
                (self.builder.historical(&returns)?, risk_free_rate)
            }
        };

        self.optimize_model(
            &model,
            risk_free_rate,
            max_weight,
            ceiling,
            date,
            expected_returns,
        )
    }

    /// Minimum-volatility portfolio. Only prices are fetched.
    pub async fn minimum_volatility_portfolio(
        &self,
        tickers: &[String],
        date: NaiveDate,
        max_weight: f64,
    ) -> Result<MinimumVolatilityResult> {
        validate_allocation(tickers, max_weight)?;
        let start = lookback_start(date, self.config.lookback_years)?;

        info!(tickers = tickers.len(), %start, end = %date, "minimizing volatility");

        let returns = self.source.fetch_returns(tickers, None, start, date).await?;
        let covariance = self.builder.covariance(&returns)?;
        self.minimum_volatility_from_covariance(tickers, &covariance, max_weight, date)
    }

    /// Optimize an already built return model.
    ///
    /// Runs both phases and reports rounded statistics; the Sharpe ratio is
    /// computed from the rounded return and volatility so the three agree.
    pub fn optimize_model(
        &self,
        model: &ReturnModel,
        risk_free_rate: RiskFreeRate,
        max_weight: f64,
        ceiling: RiskCeiling,
        date: NaiveDate,
        expected_returns: ExpectedReturnSource,
    ) -> Result<OptimizationResult> {
        validate_allocation(model.symbols(), max_weight)?;
        validate_ceiling(ceiling)?;

        let solution = self
            .optimizer
            .optimize(model, risk_free_rate, max_weight, ceiling)?;
        let stats = performance(
            &solution.weights,
            model.expected_returns(),
            model.covariance(),
        )?;

        let decimals = self.config.decimals;
        let expected_return = round_to(stats.expected_return, decimals);
        let volatility = round_to(stats.volatility, decimals);
        let sharpe = sharpe_ratio(expected_return, volatility, risk_free_rate)?;

        Ok(OptimizationResult {
            tickers: model.symbols().to_vec(),
            weights: display_weights(&solution.weights),
            expected_return,
            volatility,
            sharpe_ratio: round_to(sharpe, decimals),
            min_volatility: round_to(solution.minimum_variance.volatility, decimals),
            date,
            risk_free_rate: risk_free_rate.value(),
            expected_return_source: expected_returns,
            risk_ceiling_infeasible: solution.fell_back(),
            risk_ceiling_active: solution.ceiling_active(),
        })
    }

    /// Minimum-volatility weights for a known covariance matrix.
    pub fn minimum_volatility_from_covariance(
        &self,
        tickers: &[String],
        covariance: &Array2<f64>,
        max_weight: f64,
        date: NaiveDate,
    ) -> Result<MinimumVolatilityResult> {
        validate_allocation(tickers, max_weight)?;
        if covariance.nrows() != tickers.len() {
            return Err(PortfolioError::InvalidRequest(format!(
                "{} tickers but a {}x{} covariance matrix",
                tickers.len(),
                covariance.nrows(),
                covariance.ncols()
            )));
        }

        let minimum = self.optimizer.minimum_variance(covariance, max_weight)?;
        Ok(MinimumVolatilityResult {
            tickers: tickers.to_vec(),
            weights: display_weights(&minimum.weights),
            min_volatility: round_to(minimum.volatility, self.config.decimals),
            date,
        })
    }

    async fn risk_free_rate(&self) -> Result<RiskFreeRate> {
        Ok(self.source.fetch_risk_free_rate().await?)
    }

    /// Betas in ticker order. A failed metadata fetch leaves every beta unknown.
    async fn betas(&self, tickers: &[String]) -> Result<Vec<Option<f64>>> {
        let metadata = match self.source.fetch_metadata(tickers).await {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(error = %err, "instrument metadata unavailable, using default betas");
                HashMap::new()
            }
        };
        Ok(tickers
            .iter()
            .map(|t| metadata.get(t).and_then(|m| m.beta))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryMarketData;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn engine() -> PortfolioEngine<InMemoryMarketData> {
        PortfolioEngine::new(InMemoryMarketData::new(), EngineConfig::default())
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
    }

    fn symbols(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("A{}", i)).collect()
    }

    #[test]
    fn test_ceiling_below_minimum_returns_minimum_variance() {
        // Uncorrelated, equal variances: minimum volatility 0.26 / √3 = 0.15
        let variance = 0.0675;
        let covariance = Array2::from_diag(&array![variance, variance, variance]);
        let model = ReturnModel::new(symbols(3), array![0.08, 0.10, 0.12], covariance).unwrap();

        let result = engine()
            .optimize_model(
                &model,
                RiskFreeRate::from_fraction(0.03).unwrap(),
                1.0,
                RiskCeiling::AtMost(0.10),
                date(),
                ExpectedReturnSource::Capm,
            )
            .unwrap();

        assert!(result.risk_ceiling_infeasible);
        assert!(!result.risk_ceiling_active);
        assert_abs_diff_eq!(result.volatility, 0.15, epsilon = 1e-5);
        assert_eq!(result.volatility, result.min_volatility);
        for w in &result.weights {
            assert_abs_diff_eq!(*w, 1.0 / 3.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_sharpe_matches_reported_figures() {
        let covariance = array![[0.04, 0.006], [0.006, 0.09]];
        let model = ReturnModel::new(symbols(2), array![0.07, 0.12], covariance).unwrap();
        let rf = RiskFreeRate::from_fraction(0.03).unwrap();

        let result = engine()
            .optimize_model(
                &model,
                rf,
                1.0,
                RiskCeiling::Unbounded,
                date(),
                ExpectedReturnSource::HistoricalMean,
            )
            .unwrap();

        let implied = (result.expected_return - result.risk_free_rate) / result.volatility;
        assert!((result.sharpe_ratio - implied).abs() < 1e-6);
        assert!(!result.risk_ceiling_infeasible);
        assert!(!result.risk_ceiling_active);
        assert_abs_diff_eq!(result.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_reachable_ceiling_is_reported_active() {
        // Unconstrained tangency (5/7, 2/7) has volatility near 0.146
        let covariance = array![[0.04, 0.0], [0.0, 0.01]];
        let model = ReturnModel::new(symbols(2), array![0.20, 0.02], covariance).unwrap();

        let result = engine()
            .optimize_model(
                &model,
                RiskFreeRate::from_fraction(0.0).unwrap(),
                1.0,
                RiskCeiling::AtMost(0.12),
                date(),
                ExpectedReturnSource::HistoricalMean,
            )
            .unwrap();

        assert!(result.risk_ceiling_active);
        assert!(!result.risk_ceiling_infeasible);
        assert_abs_diff_eq!(result.volatility, 0.12, epsilon = 1e-5);
        assert!(result.min_volatility < result.volatility);
    }

    #[test]
    fn test_minimum_volatility_from_covariance_checks_shape() {
        let err = engine()
            .minimum_volatility_from_covariance(
                &symbols(3),
                &Array2::from_diag(&array![0.04, 0.09]),
                1.0,
                date(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn test_zero_ceiling_is_rejected() {
        let model = ReturnModel::new(symbols(1), array![0.08], array![[0.04]]).unwrap();
        let err = engine()
            .optimize_model(
                &model,
                RiskFreeRate::ZERO,
                1.0,
                RiskCeiling::AtMost(0.0),
                date(),
                ExpectedReturnSource::Capm,
            )
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }
}
