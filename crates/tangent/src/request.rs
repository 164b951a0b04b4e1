//! Request validation.
//!
//! Everything here runs before any data is fetched or any solver is invoked.

use crate::error::{PortfolioError, Result};
use chrono::{Months, NaiveDate};
use std::collections::HashSet;
use tangent_optimize::RiskCeiling;

/// Slack on `max_weight * N >= 1` for caps like `1/3`.
const CAP_SUM_TOLERANCE: f64 = 1e-12;

/// Check the ticker list and the per-asset cap.
///
/// An empty list or caps summing to less than one cannot hold a fully
/// invested long-only portfolio.
pub fn validate_allocation(tickers: &[String], max_weight: f64) -> Result<()> {
    if tickers.is_empty() {
        return Err(PortfolioError::InfeasibleConstraints(
            "at least one ticker is required".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(tickers.len());
    for ticker in tickers {
        if ticker.trim().is_empty() {
            return Err(PortfolioError::InvalidRequest("empty ticker symbol".to_string()));
        }
        if !seen.insert(ticker.as_str()) {
            return Err(PortfolioError::InvalidRequest(format!(
                "duplicate ticker {}",
                ticker
            )));
        }
    }

    if !max_weight.is_finite() || max_weight <= 0.0 {
        return Err(PortfolioError::InfeasibleConstraints(format!(
            "max_weight must be positive, got {}",
            max_weight
        )));
    }
    let capacity = max_weight.min(1.0) * tickers.len() as f64;
    if capacity < 1.0 - CAP_SUM_TOLERANCE {
        return Err(PortfolioError::InfeasibleConstraints(format!(
            "max_weight {} across {} tickers allows only {:.4} of the portfolio",
            max_weight,
            tickers.len(),
            capacity
        )));
    }
    Ok(())
}

/// Interpret a caller-supplied `max_risk`: zero means no ceiling.
pub fn risk_ceiling(max_risk: f64) -> Result<RiskCeiling> {
    RiskCeiling::from_max_risk(max_risk).map_err(|e| PortfolioError::InvalidRequest(e.to_string()))
}

/// Reject ceilings that are not positive finite numbers.
pub fn validate_ceiling(ceiling: RiskCeiling) -> Result<()> {
    match ceiling.limit() {
        Some(max) if !max.is_finite() || max <= 0.0 => Err(PortfolioError::InvalidRequest(
            format!("risk ceiling must be positive, got {}", max),
        )),
        _ => Ok(()),
    }
}

/// First day of the lookback window ending at `date`.
///
/// Same month and day `years` earlier; 29 February falls back to the 28th.
pub fn lookback_start(date: NaiveDate, years: u32) -> Result<NaiveDate> {
    years
        .checked_mul(12)
        .and_then(|months| date.checked_sub_months(Months::new(months)))
        .ok_or_else(|| {
            PortfolioError::InvalidRequest(format!(
                "cannot look back {} years from {}",
                years, date
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tickers(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[rstest]
    #[case(&["A", "B", "C", "D"], 0.25)]
    #[case(&["A", "B", "C"], 1.0 / 3.0)]
    #[case(&["A"], 1.0)]
    #[case(&["A", "B"], 1.5)]
    fn test_feasible_allocations(#[case] symbols: &[&str], #[case] max_weight: f64) {
        assert!(validate_allocation(&tickers(symbols), max_weight).is_ok());
    }

    #[rstest]
    #[case(&[], 0.5)]
    #[case(&["A", "B", "C", "D"], 0.2)]
    #[case(&["A"], 0.0)]
    #[case(&["A"], f64::NAN)]
    fn test_infeasible_allocations(#[case] symbols: &[&str], #[case] max_weight: f64) {
        let err = validate_allocation(&tickers(symbols), max_weight).unwrap_err();
        assert_eq!(err.kind(), "infeasible_constraints");
    }

    #[rstest]
    #[case(&["A", "A"])]
    #[case(&["A", " "])]
    fn test_malformed_tickers(#[case] symbols: &[&str]) {
        let err = validate_allocation(&tickers(symbols), 1.0).unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[rstest]
    #[case(0.0, RiskCeiling::Unbounded)]
    #[case(0.18, RiskCeiling::AtMost(0.18))]
    fn test_risk_ceiling(#[case] max_risk: f64, #[case] expected: RiskCeiling) {
        assert_eq!(risk_ceiling(max_risk).unwrap(), expected);
    }

    #[rstest]
    #[case(-0.1)]
    #[case(f64::NAN)]
    fn test_bad_risk_ceiling(#[case] max_risk: f64) {
        assert_eq!(risk_ceiling(max_risk).unwrap_err().kind(), "invalid_request");
    }

    #[test]
    fn test_validate_ceiling() {
        assert!(validate_ceiling(RiskCeiling::Unbounded).is_ok());
        assert!(validate_ceiling(RiskCeiling::AtMost(0.2)).is_ok());
        assert!(validate_ceiling(RiskCeiling::AtMost(0.0)).is_err());
        assert!(validate_ceiling(RiskCeiling::AtMost(f64::INFINITY)).is_err());
    }

    #[rstest]
    #[case((2024, 6, 14), 5, (2019, 6, 14))]
    #[case((2024, 2, 29), 5, (2019, 2, 28))]
    #[case((2024, 2, 29), 4, (2020, 2, 29))]
    fn test_lookback_start(
        #[case] date: (i32, u32, u32),
        #[case] years: u32,
        #[case] expected: (i32, u32, u32),
    ) {
        let ymd = |(y, m, d): (i32, u32, u32)| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(lookback_start(ymd(date), years).unwrap(), ymd(expected));
    }
}
