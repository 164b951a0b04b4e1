//! Instrument profiles from the Yahoo Finance quote-summary endpoint.

use crate::error::{DataError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const MODULES: &str = "price,summaryProfile,summaryDetail,defaultKeyStatistics";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)";

/// Descriptive data and market beta of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentProfile {
    /// Ticker symbol
    pub symbol: String,
    /// Company or fund name
    pub long_name: Option<String>,
    /// Sector classification
    pub sector: Option<String>,
    /// Industry classification
    pub industry: Option<String>,
    /// Latest regular-market price
    pub price: Option<f64>,
    /// Market beta
    pub beta: Option<f64>,
}

/// Yahoo Finance quote-summary provider.
#[derive(Debug)]
pub struct YahooSummaryProvider {
    client: reqwest::Client,
    rate_limit_delay: Duration,
}

impl YahooSummaryProvider {
    /// Create a provider with the default pause between requests (250ms).
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(Duration::from_millis(250))
    }

    /// Create a provider with a custom pause between requests.
    pub fn with_rate_limit(rate_limit_delay: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().user_agent(USER_AGENT).build()?,
            rate_limit_delay,
        })
    }

    /// Fetch the profile of one symbol.
    pub async fn fetch_profile(&self, symbol: &str) -> Result<InstrumentProfile> {
        if symbol.is_empty() {
            return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
        }

        let url = format!("{}/{}", QUOTE_SUMMARY_URL, symbol);
        let body: Value = self
            .client
            .get(&url)
            .query(&[("modules", MODULES)])
            .send()
            .await?
            .json()
            .await?;

        sleep(self.rate_limit_delay).await;

        let profile = parse_quote_summary(symbol, &body)?;
        debug!(symbol, beta = ?profile.beta, "fetched instrument profile");
        Ok(profile)
    }
}

/// Parse a quote-summary response body.
///
/// Numeric fields arrive either as bare numbers or as `{"raw": x, "fmt": "..."}`
/// objects; empty objects mean "not available".
pub fn parse_quote_summary(symbol: &str, body: &Value) -> Result<InstrumentProfile> {
    let summary = body
        .get("quoteSummary")
        .ok_or_else(|| DataError::Parse("response has no quoteSummary".to_string()))?;

    if let Some(error) = summary.get("error").filter(|e| !e.is_null()) {
        let reason = error
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("quote summary error")
            .to_string();
        return Err(DataError::MissingData {
            symbol: symbol.to_string(),
            reason,
        });
    }

    let result = summary
        .get("result")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .ok_or_else(|| DataError::MissingData {
            symbol: symbol.to_string(),
            reason: "empty quote summary".to_string(),
        })?;

    let module = |name: &str| result.get(name);
    let text = |module_name: &str, field: &str| {
        module(module_name)
            .and_then(|m| m.get(field))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let number = |module_name: &str, field: &str| {
        module(module_name)
            .and_then(|m| m.get(field))
            .and_then(raw_number)
    };

    Ok(InstrumentProfile {
        symbol: symbol.to_string(),
        long_name: text("price", "longName").or_else(|| text("price", "shortName")),
        sector: text("summaryProfile", "sector"),
        industry: text("summaryProfile", "industry"),
        price: number("price", "regularMarketPrice"),
        beta: number("defaultKeyStatistics", "beta").or_else(|| number("summaryDetail", "beta")),
    })
}

fn raw_number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.get("raw").and_then(Value::as_f64))
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_summary() {
        let body = json!({
            "quoteSummary": {
                "result": [{
                    "price": {
                        "longName": "Apple Inc.",
                        "regularMarketPrice": {"raw": 189.84, "fmt": "189.84"}
                    },
                    "summaryProfile": {
                        "sector": "Technology",
                        "industry": "Consumer Electronics"
                    },
                    "defaultKeyStatistics": {
                        "beta": {"raw": 1.29, "fmt": "1.29"}
                    }
                }],
                "error": null
            }
        });

        let profile = parse_quote_summary("AAPL", &body).unwrap();
        assert_eq!(profile.long_name.as_deref(), Some("Apple Inc."));
        assert_eq!(profile.sector.as_deref(), Some("Technology"));
        assert_eq!(profile.industry.as_deref(), Some("Consumer Electronics"));
        assert_eq!(profile.price, Some(189.84));
        assert_eq!(profile.beta, Some(1.29));
    }

    #[test]
    fn test_parse_fund_without_beta() {
        let body = json!({
            "quoteSummary": {
                "result": [{
                    "price": {"shortName": "SPDR S&P 500", "regularMarketPrice": 512.3},
                    "defaultKeyStatistics": {"beta": {}},
                    "summaryDetail": {}
                }],
                "error": null
            }
        });

        let profile = parse_quote_summary("SPY", &body).unwrap();
        assert_eq!(profile.long_name.as_deref(), Some("SPDR S&P 500"));
        assert_eq!(profile.price, Some(512.3));
        assert_eq!(profile.beta, None);
        assert_eq!(profile.sector, None);
    }

    #[test]
    fn test_beta_falls_back_to_summary_detail() {
        let body = json!({
            "quoteSummary": {
                "result": [{"summaryDetail": {"beta": {"raw": 0.85}}}],
                "error": null
            }
        });
        assert_eq!(parse_quote_summary("KO", &body).unwrap().beta, Some(0.85));
    }

    #[test]
    fn test_parse_not_found() {
        let body = json!({
            "quoteSummary": {
                "result": null,
                "error": {"code": "Not Found", "description": "Quote not found for ticker symbol: ZZZZ"}
            }
        });

        let err = parse_quote_summary("ZZZZ", &body).unwrap_err();
        assert!(err.is_missing());
        assert!(err.to_string().contains("Quote not found"));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            parse_quote_summary("AAPL", &json!({"chart": {}})),
            Err(DataError::Parse(_))
        ));
    }
}
