//! Return Model
//!
//! Pairs an annualized expected-return vector with an annualized covariance
//! matrix over the same ordered set of instruments. The builder turns aligned
//! daily returns into the statistics the optimizer consumes:
//!
//! - covariance   = sample covariance × 252
//! - mean returns = arithmetic mean × 252
//! - market       = benchmark mean × 252

use crate::capm::CapmModel;
use crate::covariance::{
    CovarianceError, CovarianceEstimator, SampleCovarianceEstimator, is_positive_semidefinite,
    is_symmetric,
};
use crate::error::{Result, RiskError};
use crate::returns::{AssetReturns, TRADING_DAYS_PER_YEAR};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum number of return observations for a defined sample variance.
pub const MIN_OBSERVATIONS: usize = 2;

/// Expected returns and covariance over an ordered set of instruments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnModel {
    symbols: Vec<String>,
    expected_returns: Array1<f64>,
    covariance: Array2<f64>,
}

impl ReturnModel {
    /// Create a return model, validating dimensions, symmetry and
    /// positive semidefiniteness of the covariance.
    pub fn new(
        symbols: Vec<String>,
        expected_returns: Array1<f64>,
        covariance: Array2<f64>,
    ) -> Result<Self> {
        let n = symbols.len();
        if expected_returns.len() != n {
            return Err(RiskError::DimensionMismatch(format!(
                "{} expected returns for {} symbols",
                expected_returns.len(),
                n
            )));
        }
        validate_covariance(&covariance, n)?;
        if expected_returns.iter().any(|r| !r.is_finite()) {
            return Err(RiskError::NonFinite("expected returns".to_string()));
        }

        Ok(Self {
            symbols,
            expected_returns,
            covariance,
        })
    }

    /// Instrument identifiers in model order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Annualized expected returns.
    pub const fn expected_returns(&self) -> &Array1<f64> {
        &self.expected_returns
    }

    /// Annualized covariance matrix.
    pub const fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    /// Number of instruments.
    pub fn n_assets(&self) -> usize {
        self.symbols.len()
    }
}

/// Validate that a covariance matrix is N x N, finite, symmetric and PSD.
pub fn validate_covariance(covariance: &Array2<f64>, n: usize) -> Result<()> {
    if covariance.dim() != (n, n) {
        return Err(RiskError::DimensionMismatch(format!(
            "covariance is {:?} for {} symbols",
            covariance.dim(),
            n
        )));
    }
    if covariance.iter().any(|v| !v.is_finite()) {
        return Err(CovarianceError::NonFinite.into());
    }
    if !is_symmetric(covariance, 1e-9) {
        return Err(CovarianceError::NotSymmetric.into());
    }
    if !is_positive_semidefinite(covariance, 1e-9)? {
        let min_eigenvalue = crate::covariance::jacobi_eigendecomp(covariance, 100, 1e-14)?
            .min_eigenvalue()
            .unwrap_or(f64::NAN);
        return Err(CovarianceError::NotPositiveSemidefinite { min_eigenvalue }.into());
    }
    Ok(())
}

/// Builds return-model statistics from aligned daily returns.
#[derive(Debug, Clone, Default)]
pub struct ReturnModelBuilder<C = SampleCovarianceEstimator> {
    estimator: C,
}

impl ReturnModelBuilder {
    /// Builder using the annualized sample covariance.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: CovarianceEstimator> ReturnModelBuilder<C> {
    /// Builder using a custom covariance estimator.
    pub const fn with_estimator(estimator: C) -> Self {
        Self { estimator }
    }

    /// Annualized covariance of instrument returns.
    pub fn covariance(&self, returns: &AssetReturns) -> Result<Array2<f64>> {
        ensure_observations(returns)?;
        let covariance = self.estimator.estimate(returns.returns())?;
        validate_covariance(&covariance, returns.n_assets())?;
        debug!(
            assets = returns.n_assets(),
            observations = returns.len(),
            "estimated covariance"
        );
        Ok(covariance)
    }

    /// Annualized arithmetic mean return of each instrument.
    pub fn historical_means(&self, returns: &AssetReturns) -> Result<Array1<f64>> {
        ensure_observations(returns)?;
        let means = returns
            .returns()
            .mean_axis(Axis(0))
            .ok_or(RiskError::InsufficientData {
                required: MIN_OBSERVATIONS,
                actual: 0,
            })?;
        Ok(means * TRADING_DAYS_PER_YEAR)
    }

    /// Annualized mean return of the benchmark.
    pub fn market_return(&self, returns: &AssetReturns) -> Result<f64> {
        ensure_observations(returns)?;
        let benchmark = returns.benchmark().ok_or(RiskError::MissingBenchmark)?;
        let mean = benchmark.mean().ok_or(RiskError::InsufficientData {
            required: MIN_OBSERVATIONS,
            actual: 0,
        })?;
        Ok(mean * TRADING_DAYS_PER_YEAR)
    }

    /// Model with historical mean expected returns.
    pub fn historical(&self, returns: &AssetReturns) -> Result<ReturnModel> {
        ReturnModel::new(
            returns.symbols().to_vec(),
            self.historical_means(returns)?,
            self.covariance(returns)?,
        )
    }

    /// Model with CAPM expected returns.
    ///
    /// # Arguments
    /// * `returns` - Aligned returns including the benchmark
    /// * `capm` - Risk-free rate and market return for this evaluation
    /// * `betas` - One optional beta per instrument, in column order
    pub fn capm(
        &self,
        returns: &AssetReturns,
        capm: &CapmModel,
        betas: &[Option<f64>],
    ) -> Result<ReturnModel> {
        if betas.len() != returns.n_assets() {
            return Err(RiskError::DimensionMismatch(format!(
                "{} betas for {} instruments",
                betas.len(),
                returns.n_assets()
            )));
        }
        ReturnModel::new(
            returns.symbols().to_vec(),
            capm.expected_returns(betas),
            self.covariance(returns)?,
        )
    }
}

fn ensure_observations(returns: &AssetReturns) -> Result<()> {
    if returns.len() < MIN_OBSERVATIONS {
        return Err(RiskError::InsufficientData {
            required: MIN_OBSERVATIONS,
            actual: returns.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capm::RiskFreeRate;
    use crate::returns::PriceHistory;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;
    use ndarray::array;

    fn history() -> PriceHistory {
        let start = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        let dates = (0..5).map(|i| start + chrono::Duration::days(i)).collect();
        let prices = array![
            [100.0, 20.0],
            [101.0, 20.4],
            [100.5, 20.2],
            [102.0, 20.6],
            [103.0, 20.5]
        ];
        PriceHistory::new(dates, vec!["AAA".into(), "BBB".into()], prices)
            .unwrap()
            .with_benchmark(array![400.0, 402.0, 401.0, 404.0, 406.0])
            .unwrap()
    }

    #[test]
    fn test_historical_model() {
        let returns = history().returns().unwrap();
        let model = ReturnModelBuilder::new().historical(&returns).unwrap();

        let daily_a: f64 = returns.returns().column(0).mean().unwrap();
        assert_eq!(model.symbols(), &["AAA".to_string(), "BBB".to_string()]);
        assert_abs_diff_eq!(model.expected_returns()[0], daily_a * 252.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            model.covariance()[[0, 1]],
            model.covariance()[[1, 0]],
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_capm_model_uses_market_return() {
        let returns = history().returns().unwrap();
        let builder = ReturnModelBuilder::new();
        let market = builder.market_return(&returns).unwrap();
        let capm = CapmModel::new(RiskFreeRate::from_fraction(0.03).unwrap(), market).unwrap();

        let model = builder.capm(&returns, &capm, &[Some(2.0), None]).unwrap();
        assert_abs_diff_eq!(
            model.expected_returns()[0],
            0.03 + 2.0 * (market - 0.03),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(model.expected_returns()[1], market, epsilon = 1e-12);
    }

    #[test]
    fn test_market_return_requires_benchmark() {
        let start = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        let dates = (0..3).map(|i| start + chrono::Duration::days(i)).collect();
        let returns = PriceHistory::new(dates, vec!["A".into()], array![[1.0], [1.1], [1.2]])
            .unwrap()
            .returns()
            .unwrap();

        assert!(matches!(
            ReturnModelBuilder::new().market_return(&returns),
            Err(RiskError::MissingBenchmark)
        ));
    }

    #[test]
    fn test_single_return_is_insufficient() {
        let start = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        let dates = vec![start, start + chrono::Duration::days(1)];
        let returns = PriceHistory::new(dates, vec!["A".into()], array![[1.0], [1.1]])
            .unwrap()
            .returns()
            .unwrap();

        assert!(matches!(
            ReturnModelBuilder::new().covariance(&returns),
            Err(RiskError::InsufficientData {
                required: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_rejects_indefinite_covariance() {
        let result = ReturnModel::new(
            vec!["A".into(), "B".into()],
            array![0.1, 0.1],
            array![[1.0, 2.0], [2.0, 1.0]],
        );
        assert!(matches!(
            result,
            Err(RiskError::Covariance(
                CovarianceError::NotPositiveSemidefinite { .. }
            ))
        ));
    }
}
