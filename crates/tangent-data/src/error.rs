//! Failures raised while fetching, caching, or aligning market data.

use thiserror::Error;

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, DataError>;

/// Everything that can go wrong between Yahoo Finance and an aligned price panel.
#[derive(Debug, Error)]
pub enum DataError {
    /// The quote service rejected or failed the request
    #[error("quote service error: {0}")]
    YahooApi(String),

    /// Transport failure talking to the summary endpoint
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Quote cache failure
    #[error("quote cache: {0}")]
    Database(#[from] rusqlite::Error),

    /// A response or cached row could not be read
    #[error("malformed data: {0}")]
    Parse(String),

    /// Requested window is empty
    #[error("empty date window [{start}, {end})")]
    InvalidDateRange {
        /// First day of the window
        start: String,
        /// Day after the last day of the window
        end: String,
    },

    /// The source has nothing for this symbol
    #[error("no data for {symbol}: {reason}")]
    MissingData {
        /// Symbol that was queried
        symbol: String,
        /// What was missing
        reason: String,
    },

    /// DataFrame construction or query failed
    #[error("frame error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// JSON payload could not be decoded
    #[error("json: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Date could not be mapped onto a timestamp
    #[error("date conversion: {0}")]
    TimeConversion(String),

    /// Symbol is empty or malformed
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Cache file could not be created
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<yahoo_finance_api::YahooError> for DataError {
    fn from(err: yahoo_finance_api::YahooError) -> Self {
        Self::YahooApi(err.to_string())
    }
}

impl DataError {
    /// Whether the source simply has nothing for the symbol, as opposed to
    /// a transport or storage failure.
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::MissingData { .. } | Self::InvalidSymbol(_))
    }
}
