//! SQLite cache for daily quotes.

use crate::error::{DataError, Result};
use chrono::{NaiveDate, Utc};
use polars::prelude::*;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Share of expected trading days that must be cached to serve a range.
const COVERAGE_THRESHOLD: f64 = 0.9;
/// Trading days per calendar day (252 / 365).
const TRADING_DAY_RATIO: f64 = 252.0 / 365.0;

/// SQLite cache for quotes, keyed by `(symbol, date)`.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Connection,
}

impl SqliteCache {
    /// Open (or create) a cache database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// A cache that lives only as long as the value.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let cache = Self { conn };
        cache.create_tables()?;
        Ok(cache)
    }

    fn create_tables(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS quotes (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                close REAL NOT NULL,
                adjusted_close REAL NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (symbol, date)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_quotes_symbol_date ON quotes(symbol, date)",
            [],
        )?;

        Ok(())
    }

    /// Whether the cache covers most trading days of `[start, end)` for a symbol.
    pub fn has_quotes(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<bool> {
        let count = self.count_quotes(symbol, start, end)?;
        let days = (end - start).num_days().max(0) as f64;
        let expected = (days * TRADING_DAY_RATIO * COVERAGE_THRESHOLD).floor() as usize;
        Ok(count > 0 && count >= expected)
    }

    fn count_quotes(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM quotes
             WHERE symbol = ?1 AND date >= ?2 AND date < ?3",
            params![symbol, start.to_string(), end.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Cached quotes for a symbol over `[start, end)`, in the same
    /// `symbol, date, close, adjusted_close` layout the quote provider returns.
    pub fn get_quotes(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<DataFrame> {
        let mut stmt = self.conn.prepare(
            "SELECT date, close, adjusted_close
             FROM quotes
             WHERE symbol = ?1 AND date >= ?2 AND date < ?3
             ORDER BY date ASC",
        )?;

        let mut dates = Vec::new();
        let mut closes = Vec::new();
        let mut adj_closes = Vec::new();

        let rows = stmt.query_map(params![symbol, start.to_string(), end.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;

        for row in rows {
            let (date, close, adj_close) = row?;
            dates.push(date);
            closes.push(close);
            adj_closes.push(adj_close);
        }

        if dates.is_empty() {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "nothing cached in window".to_string(),
            });
        }

        let df = DataFrame::new(vec![
            Series::new("symbol".into(), vec![symbol; dates.len()]).into(),
            Series::new("date".into(), dates).into(),
            Series::new("close".into(), closes).into(),
            Series::new("adjusted_close".into(), adj_closes).into(),
        ])?;

        let df = df
            .lazy()
            .with_column(col("date").cast(DataType::Date))
            .collect()?;

        debug!(symbol, rows = df.height(), "quotes served from cache");
        Ok(df)
    }

    /// Store quotes (columns symbol, date, close, adjusted_close).
    pub fn put_quotes(&self, df: &DataFrame) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();

        let symbols = df.column("symbol")?.str()?;
        let dates = df.column("date")?.cast(&DataType::String)?;
        let dates = dates.str()?;
        let closes = df.column("close")?.f64()?;
        let adj_closes = df.column("adjusted_close")?.f64()?;

        let tx = self.conn.unchecked_transaction()?;

        let null =
            |column: &str, row: usize| DataError::Parse(format!("null {} in row {}", column, row));
        for i in 0..df.height() {
            let symbol = symbols.get(i).ok_or_else(|| null("symbol", i))?;
            let date = dates.get(i).ok_or_else(|| null("date", i))?;
            let close = closes.get(i).ok_or_else(|| null("close", i))?;
            let adj_close = adj_closes.get(i).ok_or_else(|| null("adjusted_close", i))?;

            tx.execute(
                "INSERT OR REPLACE INTO quotes
                 (symbol, date, close, adjusted_close, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![symbol, date, close, adj_close, cached_at],
            )?;
        }

        tx.commit()?;
        debug!(rows = df.height(), "quotes cached");
        Ok(())
    }

    /// Remove every cached quote.
    pub fn clear_all(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM quotes", [])?)
    }

    /// Remove cached quotes of one symbol.
    pub fn clear_symbol(&self, symbol: &str) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM quotes WHERE symbol = ?1", params![symbol])?)
    }

    /// Cache statistics.
    pub fn get_stats(&self) -> Result<CacheStats> {
        let (total_quotes, unique_symbols, first_date, last_date): (
            i64,
            i64,
            Option<String>,
            Option<String>,
        ) = self.conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT symbol), MIN(date), MAX(date) FROM quotes",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        let parse = |date: Option<String>| -> Result<Option<NaiveDate>> {
            date.map(|d| {
                d.parse::<NaiveDate>()
                    .map_err(|e| DataError::Parse(format!("cached date {}: {}", d, e)))
            })
            .transpose()
        };

        Ok(CacheStats {
            total_quotes: total_quotes as usize,
            unique_symbols: unique_symbols as usize,
            first_date: parse(first_date)?,
            last_date: parse(last_date)?,
        })
    }
}

/// Summary of what the quote cache holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Cached `(symbol, date)` rows
    pub total_quotes: usize,
    /// Distinct symbols
    pub unique_symbols: usize,
    /// Earliest cached date
    pub first_date: Option<NaiveDate>,
    /// Latest cached date
    pub last_date: Option<NaiveDate>,
}
