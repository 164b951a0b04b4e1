//! Location of the on-disk quote cache.

use std::path::PathBuf;
use tangent_data::{DataError, SqliteCache};

/// Platform cache directory for tangent.
///
/// - Linux: `~/.cache/tangent/`
/// - macOS: `~/Library/Caches/tangent/`
/// - Windows: `%LOCALAPPDATA%\tangent\`
pub(crate) fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tangent")
}

/// Path of the quote database.
pub(crate) fn cache_path() -> PathBuf {
    default_cache_dir().join("tangent.db")
}

/// Open the cache, creating its directory if needed.
pub(crate) fn open_cache() -> Result<SqliteCache, DataError> {
    let path = cache_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    SqliteCache::new(&path)
}
