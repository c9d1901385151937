//! Adjusted close history from Yahoo Finance.

use crate::error::{DataError, Result};
use crate::prices::{PriceSeries, PriceTable};
use crate::source::{PriceSource, validate_range};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use polars::prelude::*;
use std::time::Duration;
use tokio::time::sleep;
use yahoo_finance_api as yahoo;

/// Default number of concurrent symbol requests.
const DEFAULT_CONCURRENCY: usize = 4;

/// Yahoo Finance quote provider with rate limiting.
pub struct YahooQuoteProvider {
    provider: yahoo::YahooConnector,
    rate_limit_delay: Duration,
    concurrency: usize,
}

impl std::fmt::Debug for YahooQuoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooQuoteProvider")
            .field("rate_limit_delay", &self.rate_limit_delay)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl YahooQuoteProvider {
    /// Create a provider with the default rate limit (250ms between requests
    /// per worker).
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(Duration::from_millis(250))
    }

    /// Create a provider with a custom delay applied after every request.
    pub fn with_rate_limit(rate_limit_delay: Duration) -> Result<Self> {
        Ok(Self {
            provider: yahoo::YahooConnector::new()?,
            rate_limit_delay,
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    /// Set the number of symbols fetched concurrently by
    /// [`PriceSource::price_table`].
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fetch daily quotes for a single symbol.
    ///
    /// # Returns
    /// A Polars DataFrame with columns: symbol, date, close, adjusted_close
    pub async fn fetch_quotes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame> {
        validate_range(start, end)?;

        if symbol.is_empty() {
            return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
        }

        let start_time = to_offset_datetime(start)?;
        // Yahoo treats the end bound as exclusive.
        let end_time = to_offset_datetime(end + chrono::Duration::days(1))?;

        let response = self
            .provider
            .get_quote_history(symbol, start_time, end_time)
            .await?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::YahooApi(e.to_string()))?;

        if quotes.is_empty() {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "No data returned from Yahoo Finance".to_string(),
            });
        }

        let timestamps: Vec<i64> = quotes.iter().map(|q| q.timestamp).collect();
        let closes: Vec<f64> = quotes.iter().map(|q| q.close).collect();
        let adj_closes: Vec<f64> = quotes.iter().map(|q| q.adjclose).collect();

        let mut df = DataFrame::new(vec![
            Series::new("timestamp".into(), timestamps).into(),
            Series::new("close".into(), closes).into(),
            Series::new("adjusted_close".into(), adj_closes).into(),
        ])?;

        let symbol_col: Column = Series::new("symbol".into(), vec![symbol; df.height()]).into();
        df.with_column(symbol_col)?;

        let df = df
            .lazy()
            .with_column(
                (col("timestamp") * lit(1_000_000_000))
                    .cast(DataType::Datetime(TimeUnit::Nanoseconds, None))
                    .cast(DataType::Date)
                    .alias("date"),
            )
            .select(&[
                col("symbol"),
                col("date"),
                col("close"),
                col("adjusted_close"),
            ])
            .collect()?;

        sleep(self.rate_limit_delay).await;

        Ok(df)
    }
}

fn to_offset_datetime(date: NaiveDate) -> Result<time::OffsetDateTime> {
    let timestamp = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| DataError::TimeConversion(format!("Invalid date {}", date)))?
        .and_utc()
        .timestamp();
    time::OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|e| DataError::TimeConversion(e.to_string()))
}

impl PriceSource for YahooQuoteProvider {
    async fn price_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        let df = self.fetch_quotes(symbol, start, end).await?;
        let series = PriceSeries::from_frame(symbol, &df)?.between(start, end);
        if series.is_empty() {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: format!("No quotes between {} and {}", start, end),
            });
        }
        Ok(series)
    }

    async fn price_table(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable> {
        validate_range(start, end)?;

        let mut fetched: Vec<(usize, PriceSeries)> = stream::iter(symbols.iter().enumerate())
            .map(|(i, symbol)| async move { (i, symbol, self.price_series(symbol, start, end).await) })
            .buffer_unordered(self.concurrency)
            .filter_map(|(i, symbol, result)| async move {
                match result {
                    Ok(series) => Some((i, series)),
                    Err(e) => {
                        tracing::warn!(%symbol, error = %e, "failed to fetch prices");
                        None
                    }
                }
            })
            .collect()
            .await;

        // Keep the requested column order regardless of completion order.
        fetched.sort_by_key(|(i, _)| *i);
        tracing::info!(
            requested = symbols.len(),
            resolved = fetched.len(),
            "fetched Yahoo price table"
        );

        PriceTable::new(fetched.into_iter().map(|(_, s)| s).collect())
    }
}
