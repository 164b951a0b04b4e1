//! Yahoo Finance data providers.

pub mod quotes;
pub mod summary;

pub use quotes::YahooQuoteProvider;
pub use summary::{InstrumentProfile, YahooSummaryProvider, parse_quote_summary};
