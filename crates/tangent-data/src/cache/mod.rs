//! Caching layer for market data.

pub mod sqlite;
pub mod ttl;

pub use sqlite::{CacheStats, SqliteCache};
pub use ttl::TtlCache;
