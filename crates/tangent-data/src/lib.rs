#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tangent/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod error;
pub mod history;
pub mod yahoo;

pub use cache::{CacheStats, SqliteCache, TtlCache};
pub use error::{DataError, Result};
pub use history::{AlignedCloses, align_closes};
pub use yahoo::{InstrumentProfile, YahooQuoteProvider, YahooSummaryProvider};
