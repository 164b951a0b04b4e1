//! Daily quotes from Yahoo Finance.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use yahoo_finance_api as yahoo;

const SECONDS_PER_DAY: i64 = 86_400;

/// Yahoo Finance quote provider with rate limiting.
pub struct YahooQuoteProvider {
    provider: yahoo::YahooConnector,
    rate_limit_delay: Duration,
}

impl std::fmt::Debug for YahooQuoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooQuoteProvider")
            .field("rate_limit_delay", &self.rate_limit_delay)
            .finish_non_exhaustive()
    }
}

impl YahooQuoteProvider {
    /// Create a provider with the default pause between requests (250ms).
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(Duration::from_millis(250))
    }

    /// Create a provider with a custom pause between requests.
    pub fn with_rate_limit(rate_limit_delay: Duration) -> Result<Self> {
        Ok(Self {
            provider: yahoo::YahooConnector::new()?,
            rate_limit_delay,
        })
    }

    /// Fetch daily closes for one symbol over `[start, end)`.
    ///
    /// # Returns
    /// A Polars DataFrame with columns: symbol, date, close, adjusted_close,
    /// sorted by date. Rows with a non-positive adjusted close are dropped.
    pub async fn fetch_quotes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame> {
        validate_request(symbol, start, end)?;

        let start_time = to_offset_datetime(start)?;
        let end_time = to_offset_datetime(end)?;

        let response = self
            .provider
            .get_quote_history(symbol, start_time, end_time)
            .await?;
        let quotes = response
            .quotes()
            .map_err(|e| DataError::YahooApi(e.to_string()))?;

        let rows: Vec<(i64, f64, f64)> = quotes
            .iter()
            .map(|q| (q.timestamp, q.close, q.adjclose))
            .collect();

        let df = quotes_frame(symbol, rows, end)?;
        debug!(symbol, rows = df.height(), %start, %end, "fetched quotes");

        sleep(self.rate_limit_delay).await;

        if df.height() == 0 {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: format!("no prices between {} and {}", start, end),
            });
        }
        Ok(df)
    }

    /// Most recent close of a quote, e.g. the 13-week T-bill yield `^IRX`.
    pub async fn fetch_latest_close(&self, symbol: &str) -> Result<f64> {
        if symbol.is_empty() {
            return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
        }

        let response = self.provider.get_latest_quotes(symbol, "1d").await?;
        let quote = response.last_quote()?;
        if !quote.close.is_finite() {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "latest close is not a number".to_string(),
            });
        }
        debug!(symbol, close = quote.close, "fetched latest close");
        Ok(quote.close)
    }
}

fn validate_request(symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<()> {
    if symbol.is_empty() {
        return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
    }
    if start >= end {
        return Err(DataError::InvalidDateRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    Ok(())
}

fn to_offset_datetime(date: NaiveDate) -> Result<time::OffsetDateTime> {
    let timestamp = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| DataError::TimeConversion(format!("invalid midnight for {}", date)))?
        .and_utc()
        .timestamp();
    time::OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|e| DataError::TimeConversion(e.to_string()))
}

/// Build the quote frame from `(unix timestamp, close, adjusted close)` rows,
/// keeping rows dated before `end` with a usable adjusted close. When Yahoo
/// reports a day twice (a live row next to the settled one) the last wins.
pub(crate) fn quotes_frame(
    symbol: &str,
    rows: Vec<(i64, f64, f64)>,
    end: NaiveDate,
) -> Result<DataFrame> {
    let day = |timestamp: i64| timestamp.div_euclid(SECONDS_PER_DAY);
    let mut deduped: Vec<(i64, f64, f64)> = Vec::with_capacity(rows.len());
    for row in rows {
        match deduped.last_mut() {
            Some(last) if day(last.0) == day(row.0) => *last = row,
            _ => deduped.push(row),
        }
    }

    let height = deduped.len();
    let df = DataFrame::new(vec![
        Series::new("symbol".into(), vec![symbol; height]).into(),
        Series::new(
            "timestamp".into(),
            deduped.iter().map(|r| r.0).collect::<Vec<i64>>(),
        )
        .into(),
        Series::new(
            "close".into(),
            deduped.iter().map(|r| r.1).collect::<Vec<f64>>(),
        )
        .into(),
        Series::new(
            "adjusted_close".into(),
            deduped.iter().map(|r| r.2).collect::<Vec<f64>>(),
        )
        .into(),
    ])?;

    let df = df
        .lazy()
        .with_column(
            (col("timestamp") * lit(1_000_000_000))
                .cast(DataType::Datetime(TimeUnit::Nanoseconds, None))
                .cast(DataType::Date)
                .alias("date"),
        )
        .filter(
            col("date")
                .lt(lit(end))
                .and(col("adjusted_close").gt(lit(0.0))),
        )
        .select([
            col("symbol"),
            col("date"),
            col("close"),
            col("adjusted_close"),
        ])
        .sort(["date"], SortMultipleOptions::default())
        .collect()?;

    Ok(df)
}
