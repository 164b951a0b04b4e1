//! Aligned price histories and daily returns.
//!
//! A [`PriceHistory`] holds closing prices for N instruments (and optionally a
//! benchmark) on a common set of trading dates. Converting it into
//! [`AssetReturns`] takes the simple percentage change between consecutive
//! rows and drops the first, undefined, row.

use crate::error::{Result, RiskError};
use chrono::NaiveDate;
use ndarray::{Array1, Array2, Axis, s};

/// Trading days per year used to annualize daily statistics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Closing prices aligned on common dates.
///
/// Rows are dates (ascending), columns follow `symbols`.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    prices: Array2<f64>,
    benchmark: Option<Array1<f64>>,
}

impl PriceHistory {
    /// Create a price history, validating shapes and values.
    ///
    /// # Arguments
    /// * `dates` - Trading dates, one per row, strictly ascending
    /// * `symbols` - Instrument identifiers, one per column
    /// * `prices` - Price matrix (T x N)
    pub fn new(dates: Vec<NaiveDate>, symbols: Vec<String>, prices: Array2<f64>) -> Result<Self> {
        let (rows, cols) = prices.dim();
        if rows != dates.len() {
            return Err(RiskError::DimensionMismatch(format!(
                "{} price rows but {} dates",
                rows,
                dates.len()
            )));
        }
        if cols != symbols.len() {
            return Err(RiskError::DimensionMismatch(format!(
                "{} price columns but {} symbols",
                cols,
                symbols.len()
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RiskError::DimensionMismatch(
                "dates must be strictly ascending".to_string(),
            ));
        }

        for ((row, col), &price) in prices.indexed_iter() {
            if !price.is_finite() {
                return Err(RiskError::NonFinite(format!("price of {}", symbols[col])));
            }
            if price <= 0.0 {
                return Err(RiskError::NonPositivePrice {
                    symbol: symbols[col].clone(),
                    row,
                    price,
                });
            }
        }

        Ok(Self {
            dates,
            symbols,
            prices,
            benchmark: None,
        })
    }

    /// Attach benchmark prices aligned on the same dates.
    pub fn with_benchmark(mut self, benchmark: Array1<f64>) -> Result<Self> {
        if benchmark.len() != self.dates.len() {
            return Err(RiskError::DimensionMismatch(format!(
                "{} benchmark prices but {} dates",
                benchmark.len(),
                self.dates.len()
            )));
        }
        if let Some((row, &price)) = benchmark
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || **p <= 0.0)
        {
            return Err(RiskError::NonPositivePrice {
                symbol: "benchmark".to_string(),
                row,
                price,
            });
        }
        self.benchmark = Some(benchmark);
        Ok(self)
    }

    /// Trading dates.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Instrument identifiers in column order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Price matrix (T x N).
    pub const fn prices(&self) -> &Array2<f64> {
        &self.prices
    }

    /// Benchmark prices, if attached.
    pub const fn benchmark(&self) -> Option<&Array1<f64>> {
        self.benchmark.as_ref()
    }

    /// Number of aligned price observations.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// True if there are no observations.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Compute simple daily returns.
    ///
    /// Fails with [`RiskError::InsufficientData`] when fewer than two prices exist.
    pub fn returns(&self) -> Result<AssetReturns> {
        let n_obs = self.len();
        if n_obs < 2 {
            return Err(RiskError::InsufficientData {
                required: 2,
                actual: n_obs,
            });
        }

        let returns = pct_change(&self.prices);
        let benchmark = self.benchmark.as_ref().map(|b| {
            let column = b.view().insert_axis(Axis(1));
            pct_change(&column.to_owned()).column(0).to_owned()
        });

        Ok(AssetReturns {
            dates: self.dates[1..].to_vec(),
            symbols: self.symbols.clone(),
            returns,
            benchmark,
        })
    }
}

/// Percentage change between consecutive rows: p[t] / p[t-1] - 1.
fn pct_change(prices: &Array2<f64>) -> Array2<f64> {
    let current = prices.slice(s![1.., ..]);
    let previous = prices.slice(s![..-1, ..]);
    &current / &previous - 1.0
}

/// Daily returns aligned on common dates.
#[derive(Debug, Clone)]
pub struct AssetReturns {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    returns: Array2<f64>,
    benchmark: Option<Array1<f64>>,
}

impl AssetReturns {
    /// Create returns directly, for callers that already hold return series.
    ///
    /// # Arguments
    /// * `dates` - One date per row
    /// * `symbols` - One identifier per column
    /// * `returns` - Fractional daily returns (T x N)
    /// * `benchmark` - Optional benchmark returns (T)
    pub fn new(
        dates: Vec<NaiveDate>,
        symbols: Vec<String>,
        returns: Array2<f64>,
        benchmark: Option<Array1<f64>>,
    ) -> Result<Self> {
        let (rows, cols) = returns.dim();
        if rows != dates.len() || cols != symbols.len() {
            return Err(RiskError::DimensionMismatch(format!(
                "returns are {}x{} but got {} dates and {} symbols",
                rows,
                cols,
                dates.len(),
                symbols.len()
            )));
        }
        if let Some(b) = &benchmark
            && b.len() != rows
        {
            return Err(RiskError::DimensionMismatch(format!(
                "{} benchmark returns but {} dates",
                b.len(),
                rows
            )));
        }
        if returns.iter().any(|r| !r.is_finite())
            || benchmark
                .as_ref()
                .is_some_and(|b| b.iter().any(|r| !r.is_finite()))
        {
            return Err(RiskError::NonFinite("returns".to_string()));
        }

        Ok(Self {
            dates,
            symbols,
            returns,
            benchmark,
        })
    }

    /// Return dates (the first price date is not included).
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Instrument identifiers in column order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Return matrix (T x N).
    pub const fn returns(&self) -> &Array2<f64> {
        &self.returns
    }

    /// Benchmark returns, if present.
    pub const fn benchmark(&self) -> Option<&Array1<f64>> {
        self.benchmark.as_ref()
    }

    /// Number of return observations.
    pub fn len(&self) -> usize {
        self.returns.nrows()
    }

    /// True if there are no observations.
    pub fn is_empty(&self) -> bool {
        self.returns.nrows() == 0
    }

    /// Number of instruments.
    pub fn n_assets(&self) -> usize {
        self.returns.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect()
    }

    #[test]
    fn test_pct_change_drops_first_row() {
        let prices = array![[100.0, 50.0], [110.0, 50.0], [99.0, 55.0]];
        let history =
            PriceHistory::new(dates(3), vec!["A".into(), "B".into()], prices).unwrap();

        let returns = history.returns().unwrap();
        assert_eq!(returns.len(), 2);
        assert_eq!(returns.dates()[0], history.dates()[1]);
        assert_abs_diff_eq!(returns.returns()[[0, 0]], 0.10, epsilon = 1e-12);
        assert_abs_diff_eq!(returns.returns()[[1, 0]], -0.10, epsilon = 1e-12);
        assert_abs_diff_eq!(returns.returns()[[0, 1]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(returns.returns()[[1, 1]], 0.10, epsilon = 1e-12);
    }

    #[test]
    fn test_benchmark_returns() {
        let prices = array![[10.0], [11.0], [12.1]];
        let history = PriceHistory::new(dates(3), vec!["A".into()], prices)
            .unwrap()
            .with_benchmark(array![200.0, 202.0, 199.98])
            .unwrap();

        let returns = history.returns().unwrap();
        let bench = returns.benchmark().unwrap();
        assert_abs_diff_eq!(bench[0], 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(bench[1], -0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_single_price_is_insufficient() {
        let history = PriceHistory::new(dates(1), vec!["A".into()], array![[10.0]]).unwrap();
        assert!(matches!(
            history.returns(),
            Err(RiskError::InsufficientData {
                required: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_rejects_non_positive_price() {
        let result = PriceHistory::new(dates(2), vec!["A".into()], array![[10.0], [0.0]]);
        assert!(matches!(result, Err(RiskError::NonPositivePrice { row: 1, .. })));
    }

    #[test]
    fn test_rejects_shape_mismatch() {
        let result = PriceHistory::new(dates(3), vec!["A".into()], array![[10.0], [11.0]]);
        assert!(matches!(result, Err(RiskError::DimensionMismatch(_))));
    }

    #[test]
    fn test_rejects_unsorted_dates() {
        let mut d = dates(2);
        d.reverse();
        let result = PriceHistory::new(d, vec!["A".into()], array![[10.0], [11.0]]);
        assert!(matches!(result, Err(RiskError::DimensionMismatch(_))));
    }
}
