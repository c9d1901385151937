//! The price source abstraction and an in-memory implementation.

use crate::error::{DataError, Result};
use crate::prices::{PriceSeries, PriceTable};
use chrono::NaiveDate;
use std::collections::HashMap;

/// A provider of adjusted closing prices.
///
/// Implementations return split/dividend-adjusted closes indexed by trading
/// date. A table request may silently omit symbols the provider cannot
/// resolve; callers are expected to check which columns came back.
#[allow(async_fn_in_trait)]
pub trait PriceSource {
    /// Fetch one symbol's prices over `[start, end]`.
    ///
    /// Fails with [`DataError::MissingData`] when nothing is available.
    async fn price_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries>;

    /// Fetch prices for several symbols over `[start, end]`.
    ///
    /// The default implementation requests each symbol in turn and drops the
    /// ones that fail.
    async fn price_table(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable> {
        validate_range(start, end)?;

        let mut columns = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match self.price_series(symbol, start, end).await {
                Ok(series) => columns.push(series),
                Err(e) => tracing::warn!(%symbol, error = %e, "dropping symbol from price table"),
            }
        }

        PriceTable::new(columns)
    }
}

/// Reject empty or inverted date ranges.
pub(crate) fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start >= end {
        return Err(DataError::InvalidDateRange { start, end });
    }
    Ok(())
}

/// Price source backed by series held in memory.
///
/// Useful for tests and for callers that already have prices loaded.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPriceSource {
    series: HashMap<String, PriceSeries>,
}

impl InMemoryPriceSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a symbol's series.
    pub fn insert(&mut self, series: PriceSeries) {
        self.series.insert(series.symbol().to_string(), series);
    }

    /// Builder-style [`Self::insert`].
    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.insert(series);
        self
    }

    /// Symbols currently held.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }
}

impl PriceSource for InMemoryPriceSource {
    async fn price_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        validate_range(start, end)?;

        let window = self
            .series
            .get(symbol)
            .map(|s| s.between(start, end))
            .filter(|s| !s.is_empty());

        window.ok_or_else(|| DataError::MissingData {
            symbol: symbol.to_string(),
            reason: "No prices in range".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn source() -> InMemoryPriceSource {
        InMemoryPriceSource::new()
            .with_series(
                PriceSeries::new("AAA", vec![(d(1), 100.0), (d(2), 110.0), (d(3), 99.0)]).unwrap(),
            )
            .with_series(
                PriceSeries::new("BBB", vec![(d(1), 50.0), (d(2), 55.0), (d(3), 60.0)]).unwrap(),
            )
    }

    #[tokio::test]
    async fn test_table_drops_unknown_symbols() {
        let symbols = vec!["AAA".to_string(), "ZZZ".to_string(), "BBB".to_string()];
        let table = source().price_table(&symbols, d(1), d(3)).await.unwrap();
        assert_eq!(table.symbols(), vec!["AAA", "BBB"]);
    }

    #[tokio::test]
    async fn test_series_is_windowed() {
        let series = source().price_series("AAA", d(2), d(3)).await.unwrap();
        assert_eq!(series.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_symbol() {
        let result = source().price_series("ZZZ", d(1), d(3)).await;
        assert!(matches!(result, Err(DataError::MissingData { .. })));
    }

    #[tokio::test]
    async fn test_invalid_date_range() {
        let result = source().price_series("AAA", d(3), d(1)).await;
        assert!(matches!(result, Err(DataError::InvalidDateRange { .. })));
    }
}
