//! Caching layer for price data.

pub mod sqlite;

pub use sqlite::{CacheStats, SqliteCache};

use crate::error::Result;
use crate::prices::{PriceSeries, PriceTable};
use crate::source::{PriceSource, validate_range};
use chrono::{NaiveDate, Utc};

/// Read-through cache in front of another [`PriceSource`].
///
/// Ranges already stored in SQLite are served locally; everything else goes
/// to the wrapped source and is written back on success.
#[derive(Debug)]
pub struct CachedPriceSource<S> {
    inner: S,
    cache: SqliteCache,
    force_refresh: bool,
}

impl<S: PriceSource> CachedPriceSource<S> {
    /// Wrap `inner` with `cache`.
    pub const fn new(inner: S, cache: SqliteCache) -> Self {
        Self {
            inner,
            cache,
            force_refresh: false,
        }
    }

    /// Ignore cached entries and always go to the wrapped source. Fresh
    /// results are still written back.
    pub const fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    /// The underlying cache.
    pub const fn cache(&self) -> &SqliteCache {
        &self.cache
    }

    fn cached(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Option<PriceSeries> {
        if self.force_refresh {
            return None;
        }
        match self.cache.has_prices(symbol, start, end) {
            Ok(true) => self.cache.get_prices(symbol, start, end).ok(),
            Ok(false) => None,
            Err(e) => {
                tracing::warn!(%symbol, error = %e, "cache lookup failed");
                None
            }
        }
    }

    /// Write back a fetched series. Only settled days are recorded: today's
    /// bar may still move, so the stored range stops at yesterday.
    fn store(&self, series: &PriceSeries, start: NaiveDate, end: NaiveDate) {
        let Some(end) = settled_end(end, Utc::now().date_naive()) else {
            return;
        };
        if end < start {
            tracing::debug!(symbol = series.symbol(), "range not settled yet, not cached");
            return;
        }

        let settled = series.between(start, end);
        if settled.is_empty() {
            return;
        }
        if let Err(e) = self.cache.put_prices(&settled, start, end) {
            tracing::warn!(symbol = series.symbol(), error = %e, "failed to cache prices");
        }
    }
}

/// Last date of `[.., end]` whose close is final as of `today`.
fn settled_end(end: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    today.pred_opt().map(|yesterday| end.min(yesterday))
}

impl<S: PriceSource> PriceSource for CachedPriceSource<S> {
    async fn price_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        validate_range(start, end)?;

        if let Some(series) = self.cached(symbol, start, end) {
            tracing::debug!(%symbol, "price cache hit");
            return Ok(series);
        }

        let series = self.inner.price_series(symbol, start, end).await?;
        self.store(&series, start, end);
        Ok(series)
    }

    async fn price_table(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable> {
        validate_range(start, end)?;

        let mut hits = Vec::new();
        let mut misses = Vec::new();
        for symbol in symbols {
            match self.cached(symbol, start, end) {
                Some(series) => hits.push(series),
                None => misses.push(symbol.clone()),
            }
        }
        tracing::debug!(hits = hits.len(), misses = misses.len(), "price cache lookup");

        let fetched = if misses.is_empty() {
            PriceTable::default()
        } else {
            self.inner.price_table(&misses, start, end).await?
        };
        for series in fetched.columns() {
            self.store(series, start, end);
        }

        // Reassemble in the requested order.
        let columns = symbols
            .iter()
            .filter_map(|symbol| {
                hits.iter()
                    .chain(fetched.columns())
                    .find(|s| s.symbol() == symbol.as_str())
                    .cloned()
            })
            .collect();

        PriceTable::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryPriceSource;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn upstream() -> InMemoryPriceSource {
        InMemoryPriceSource::new()
            .with_series(PriceSeries::new("AAA", vec![(d(1), 10.0), (d(2), 11.0)]).unwrap())
            .with_series(PriceSeries::new("BBB", vec![(d(1), 20.0), (d(2), 19.0)]).unwrap())
    }

    #[tokio::test]
    async fn test_read_through() {
        let source = CachedPriceSource::new(upstream(), SqliteCache::in_memory().unwrap());

        let first = source.price_series("AAA", d(1), d(2)).await.unwrap();
        assert!(source.cache().has_prices("AAA", d(1), d(2)).unwrap());

        let second = source.price_series("AAA", d(1), d(2)).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_served_from_cache_without_upstream() {
        let cache = SqliteCache::in_memory().unwrap();
        let series = PriceSeries::new("AAA", vec![(d(1), 10.0), (d(2), 11.0)]).unwrap();
        cache.put_prices(&series, d(1), d(2)).unwrap();

        let source = CachedPriceSource::new(InMemoryPriceSource::new(), cache);
        let table = source
            .price_table(&["AAA".to_string()], d(1), d(2))
            .await
            .unwrap();
        assert_eq!(table.symbols(), vec!["AAA"]);
    }

    #[tokio::test]
    async fn test_table_preserves_requested_order() {
        let cache = SqliteCache::in_memory().unwrap();
        let bbb = PriceSeries::new("BBB", vec![(d(1), 20.0), (d(2), 19.0)]).unwrap();
        cache.put_prices(&bbb, d(1), d(2)).unwrap();

        let source = CachedPriceSource::new(upstream(), cache);
        let symbols = vec!["AAA".to_string(), "BBB".to_string()];
        let table = source.price_table(&symbols, d(1), d(2)).await.unwrap();
        assert_eq!(table.symbols(), vec!["AAA", "BBB"]);
    }

    #[test]
    fn test_settled_end() {
        assert_eq!(settled_end(d(3), d(10)), Some(d(3)));
        assert_eq!(settled_end(d(10), d(10)), Some(d(9)));
        assert_eq!(settled_end(d(20), d(10)), Some(d(9)));
    }

    #[tokio::test]
    async fn test_todays_bar_is_not_cached() {
        let today = Utc::now().date_naive();
        let start = today - chrono::Duration::days(3);
        let days = (0..=3).map(|i| start + chrono::Duration::days(i));
        let upstream = InMemoryPriceSource::new().with_series(
            PriceSeries::new("AAA", days.zip([10.0, 11.0, 12.0, 13.0])).unwrap(),
        );
        let source = CachedPriceSource::new(upstream, SqliteCache::in_memory().unwrap());

        let served = source.price_series("AAA", start, today).await.unwrap();
        assert_eq!(served.get(today), Some(13.0));

        let cache = source.cache();
        assert!(!cache.has_prices("AAA", start, today).unwrap());
        let yesterday = today - chrono::Duration::days(1);
        assert!(cache.has_prices("AAA", start, yesterday).unwrap());
        assert_eq!(cache.get_prices("AAA", start, today).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_overlapping_fetches_are_not_mixed() {
        let original =
            PriceSeries::new("AAA", vec![(d(1), 100.0), (d(2), 101.0), (d(3), 102.0), (d(4), 103.0)])
                .unwrap();
        let rebased = PriceSeries::new("AAA", vec![(d(3), 51.0), (d(4), 51.5)]).unwrap();

        let cache = SqliteCache::in_memory().unwrap();
        cache.put_prices(&original, d(1), d(4)).unwrap();
        let source = CachedPriceSource::new(
            InMemoryPriceSource::new().with_series(rebased),
            cache,
        )
        .with_force_refresh(true);
        source.price_series("AAA", d(3), d(4)).await.unwrap();

        // The d1..d4 read no longer hits a half-replaced history.
        assert!(!source.cache().has_prices("AAA", d(1), d(4)).unwrap());
        let stored = source.cache().get_prices("AAA", d(1), d(4)).unwrap();
        assert_eq!(stored.iter().map(|(_, p)| p).collect::<Vec<_>>(), vec![51.0, 51.5]);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let cache = SqliteCache::in_memory().unwrap();
        let stale = PriceSeries::new("AAA", vec![(d(1), 1.0), (d(2), 1.0)]).unwrap();
        cache.put_prices(&stale, d(1), d(2)).unwrap();

        let source = CachedPriceSource::new(upstream(), cache).with_force_refresh(true);
        let series = source.price_series("AAA", d(1), d(2)).await.unwrap();
        assert_eq!(series.get(d(2)), Some(11.0));
    }
}
