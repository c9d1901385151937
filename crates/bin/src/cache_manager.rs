//! Price cache location and maintenance.

use meridian_data::error::DataError;
use meridian_data::SqliteCache;
use std::path::PathBuf;

/// Get the default cache directory path.
///
/// Uses platform-specific cache directories:
/// - Linux: `~/.cache/meridian/`
/// - macOS: `~/Library/Caches/meridian/`
/// - Windows: `%LOCALAPPDATA%\meridian\`
pub(crate) fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("meridian")
}

/// Get the cache database path.
pub(crate) fn cache_path() -> PathBuf {
    default_cache_dir().join("prices.db")
}

/// Open the cache, creating the directory if needed.
pub(crate) fn open_cache() -> Result<SqliteCache, DataError> {
    let path = cache_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    SqliteCache::new(&path)
}

/// Print cache location and contents.
pub(crate) fn print_cache_info() -> Result<(), DataError> {
    let path = cache_path();
    println!("Cache location: {}", path.display());

    if !path.exists() {
        println!("Cache is empty");
        return Ok(());
    }

    let stats = open_cache()?.get_stats()?;
    println!(
        "Cached data: {} prices for {} symbols",
        stats.total_prices, stats.unique_symbols
    );
    Ok(())
}

/// Delete every cached price.
pub(crate) fn clear_cache() -> Result<(), DataError> {
    let path = cache_path();
    if path.exists() {
        open_cache()?.clear_all()?;
        tracing::info!(path = %path.display(), "cache cleared");
    }
    println!("Cache cleared: {}", path.display());
    Ok(())
}
