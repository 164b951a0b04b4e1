//! Engine configuration.

use crate::error::PortfolioError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tangent_optimize::SolverConfig;

/// Where expected returns come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedReturnSource {
    /// CAPM: r_f + β (E[R_m] - r_f)
    #[default]
    Capm,
    /// Annualized arithmetic mean of each instrument's daily returns
    HistoricalMean,
}

impl ExpectedReturnSource {
    /// Name used in output and on the command line.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capm => "capm",
            Self::HistoricalMean => "historical",
        }
    }
}

impl fmt::Display for ExpectedReturnSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExpectedReturnSource {
    type Err = PortfolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "capm" => Ok(Self::Capm),
            "historical" | "historical_mean" | "historical-mean" => Ok(Self::HistoricalMean),
            other => Err(PortfolioError::InvalidRequest(format!(
                "unknown expected-return model '{}', expected capm or historical",
                other
            ))),
        }
    }
}

/// Settings of a [`PortfolioEngine`](crate::PortfolioEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Benchmark used as the market for CAPM
    pub benchmark: String,
    /// Short-term rate instrument quoted in percent
    pub risk_free_symbol: String,
    /// Years of history ending at the query date
    pub lookback_years: u32,
    /// Decimal places of reported statistics
    pub decimals: u32,
    /// Expected-return model used by `optimize_portfolio`
    pub expected_returns: ExpectedReturnSource,
    /// Solver settings
    pub solver: SolverConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            benchmark: "SPY".to_string(),
            risk_free_symbol: "^IRX".to_string(),
            lookback_years: 5,
            decimals: 6,
            expected_returns: ExpectedReturnSource::Capm,
            solver: SolverConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Load a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents).map_err(std::io::Error::other)
    }

    /// Use a different expected-return model.
    pub const fn with_expected_returns(mut self, source: ExpectedReturnSource) -> Self {
        self.expected_returns = source;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.benchmark, "SPY");
        assert_eq!(config.risk_free_symbol, "^IRX");
        assert_eq!(config.lookback_years, 5);
        assert_eq!(config.decimals, 6);
        assert_eq!(config.expected_returns, ExpectedReturnSource::Capm);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json(r#"{"lookback_years": 3, "expected_returns": "historical_mean"}"#)
                .unwrap();
        assert_eq!(config.lookback_years, 3);
        assert_eq!(config.expected_returns, ExpectedReturnSource::HistoricalMean);
        assert_eq!(config.benchmark, "SPY");
        assert_eq!(config.solver, SolverConfig::default());
    }

    #[rstest]
    #[case("capm", ExpectedReturnSource::Capm)]
    #[case("CAPM", ExpectedReturnSource::Capm)]
    #[case("historical", ExpectedReturnSource::HistoricalMean)]
    #[case("historical-mean", ExpectedReturnSource::HistoricalMean)]
    fn test_parse_source(#[case] input: &str, #[case] expected: ExpectedReturnSource) {
        assert_eq!(input.parse::<ExpectedReturnSource>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_source() {
        let err = "black-litterman"
            .parse::<ExpectedReturnSource>()
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }
}
