//! SQLite caching layer for adjusted close prices.

use crate::error::{DataError, Result};
use crate::prices::PriceSeries;
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, params};
use std::path::Path;

/// SQLite cache for price history.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Connection,
}

impl SqliteCache {
    /// Open (or create) a cache database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS prices (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                adjusted_close REAL NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (symbol, date)
            )",
            [],
        )?;

        // Records which ranges were fetched in full, so that holidays and
        // weekends inside a range don't look like gaps.
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS fetched_ranges (
                symbol TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (symbol, start_date, end_date)
            )",
            [],
        )?;

        Ok(())
    }

    /// Whether a previously stored fetch covers `[start, end]` for `symbol`.
    pub fn has_prices(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM fetched_ranges
             WHERE symbol = ?1 AND start_date <= ?2 AND end_date >= ?3",
            params![symbol, start.to_string(), end.to_string()],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    /// Get cached prices for a symbol and date range.
    pub fn get_prices(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceSeries> {
        let mut stmt = self.conn.prepare(
            "SELECT date, adjusted_close
             FROM prices
             WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC",
        )?;

        let rows = stmt.query_map(params![symbol, start.to_string(), end.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;

        let mut observations = Vec::new();
        for row in rows {
            let (date, price) = row?;
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|e| DataError::Parse(format!("Invalid cached date {}: {}", date, e)))?;
            observations.push((date, price));
        }

        if observations.is_empty() {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "No cached data found".to_string(),
            });
        }

        PriceSeries::new(symbol, observations)
    }

    /// Store a fetched series and mark `[start, end]` as covered.
    ///
    /// Replaces everything previously cached for the symbol. Adjusted closes
    /// from different fetches may sit on different adjustment bases and are
    /// never mixed.
    pub fn put_prices(&self, series: &PriceSeries, start: NaiveDate, end: NaiveDate) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;

        tx.execute("DELETE FROM prices WHERE symbol = ?1", params![series.symbol()])?;
        tx.execute(
            "DELETE FROM fetched_ranges WHERE symbol = ?1",
            params![series.symbol()],
        )?;

        for (date, price) in series.iter() {
            tx.execute(
                "INSERT OR REPLACE INTO prices (symbol, date, adjusted_close, cached_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![series.symbol(), date.to_string(), price, cached_at],
            )?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO fetched_ranges (symbol, start_date, end_date, cached_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![series.symbol(), start.to_string(), end.to_string(), cached_at],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Clear all cached data.
    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM prices", [])?;
        self.conn.execute("DELETE FROM fetched_ranges", [])?;
        Ok(())
    }

    /// Clear cached data for a specific symbol.
    pub fn clear_symbol(&self, symbol: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM prices WHERE symbol = ?1", params![symbol])?;
        self.conn
            .execute("DELETE FROM fetched_ranges WHERE symbol = ?1", params![symbol])?;
        Ok(())
    }

    /// Get cache statistics.
    pub fn get_stats(&self) -> Result<CacheStats> {
        let prices_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM prices", [], |row| row.get(0))?;

        let symbols_count: i64 =
            self.conn
                .query_row("SELECT COUNT(DISTINCT symbol) FROM prices", [], |row| {
                    row.get(0)
                })?;

        Ok(CacheStats {
            total_prices: prices_count as usize,
            unique_symbols: symbols_count as usize,
        })
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of price records
    pub total_prices: usize,
    /// Number of unique symbols
    pub unique_symbols: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn series() -> PriceSeries {
        PriceSeries::new("AAPL", vec![(d(2), 185.64), (d(3), 184.25), (d(4), 181.91)]).unwrap()
    }

    #[test]
    fn test_cache_initialization() {
        let cache = SqliteCache::in_memory();
        assert!(cache.is_ok());
    }

    #[test]
    fn test_price_round_trip() {
        let cache = SqliteCache::in_memory().unwrap();
        cache.put_prices(&series(), d(1), d(5)).unwrap();

        assert!(cache.has_prices("AAPL", d(1), d(5)).unwrap());
        assert!(cache.has_prices("AAPL", d(2), d(4)).unwrap());
        assert!(!cache.has_prices("AAPL", d(1), d(6)).unwrap());

        let cached = cache.get_prices("AAPL", d(1), d(5)).unwrap();
        assert_eq!(cached, series());
    }

    #[test]
    fn test_refetch_replaces_previous_history() {
        let cache = SqliteCache::in_memory().unwrap();
        let original =
            PriceSeries::new("AAA", vec![(d(1), 100.0), (d(2), 101.0), (d(3), 102.0), (d(4), 103.0)])
                .unwrap();
        cache.put_prices(&original, d(1), d(4)).unwrap();

        // Same symbol after a split: the later fetch is on a new basis.
        let rebased = PriceSeries::new("AAA", vec![(d(3), 51.0), (d(4), 51.5)]).unwrap();
        cache.put_prices(&rebased, d(3), d(4)).unwrap();

        assert!(!cache.has_prices("AAA", d(1), d(4)).unwrap());
        assert!(cache.has_prices("AAA", d(3), d(4)).unwrap());
        assert_eq!(cache.get_prices("AAA", d(1), d(4)).unwrap(), rebased);
        assert_eq!(cache.get_stats().unwrap().total_prices, 2);
    }

    #[test]
    fn test_missing_symbol() {
        let cache = SqliteCache::in_memory().unwrap();
        let result = cache.get_prices("MSFT", d(1), d(5));
        assert!(matches!(result, Err(DataError::MissingData { .. })));
    }

    #[test]
    fn test_cache_stats() {
        let cache = SqliteCache::in_memory().unwrap();
        assert_eq!(
            cache.get_stats().unwrap(),
            CacheStats {
                total_prices: 0,
                unique_symbols: 0
            }
        );

        cache.put_prices(&series(), d(1), d(5)).unwrap();
        let stats = cache.get_stats().unwrap();
        assert_eq!(stats.total_prices, 3);
        assert_eq!(stats.unique_symbols, 1);
    }

    #[test]
    fn test_clear_operations() {
        let cache = SqliteCache::in_memory().unwrap();
        cache.put_prices(&series(), d(1), d(5)).unwrap();

        cache.clear_symbol("AAPL").unwrap();
        assert!(!cache.has_prices("AAPL", d(1), d(5)).unwrap());

        cache.put_prices(&series(), d(1), d(5)).unwrap();
        cache.clear_all().unwrap();
        assert_eq!(cache.get_stats().unwrap().total_prices, 0);
    }
}
