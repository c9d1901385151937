//! Price source selection for the command line.

use crate::cache_manager;
use chrono::NaiveDate;
use meridian_data::error::Result;
use meridian_data::{
    CachedPriceSource, CsvPriceSource, PriceSeries, PriceSource, PriceTable, YahooQuoteProvider,
};
use std::path::Path;

/// Configuration for data fetching.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FetchConfig {
    /// Whether to use the cache.
    pub(crate) use_cache: bool,
    /// Whether to force refresh (ignore cached ranges).
    pub(crate) force_refresh: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            force_refresh: false,
        }
    }
}

/// The price source chosen from the command-line flags.
#[derive(Debug)]
pub(crate) enum Source {
    /// Local CSV price file.
    Csv(CsvPriceSource),
    /// Yahoo Finance without a cache.
    Yahoo(YahooQuoteProvider),
    /// Yahoo Finance behind the SQLite cache.
    Cached(CachedPriceSource<YahooQuoteProvider>),
}

impl Source {
    /// Open a CSV file if one is given, else Yahoo Finance with or without
    /// the cache. A cache that cannot be opened is skipped with a warning.
    pub(crate) fn select(prices: Option<&Path>, config: FetchConfig) -> Result<Self> {
        if let Some(path) = prices {
            tracing::info!(path = %path.display(), "reading prices from CSV");
            return Ok(Self::Csv(CsvPriceSource::open(path)?));
        }

        let provider = YahooQuoteProvider::new()?;
        if !config.use_cache {
            return Ok(Self::Yahoo(provider));
        }

        match cache_manager::open_cache() {
            Ok(cache) => Ok(Self::Cached(
                CachedPriceSource::new(provider, cache).with_force_refresh(config.force_refresh),
            )),
            Err(e) => {
                tracing::warn!(error = %e, "price cache unavailable, fetching without it");
                Ok(Self::Yahoo(provider))
            }
        }
    }

    /// Short description for progress messages.
    pub(crate) const fn describe(&self) -> &'static str {
        match self {
            Self::Csv(_) => "CSV file",
            Self::Yahoo(_) => "Yahoo Finance",
            Self::Cached(_) => "Yahoo Finance (cached)",
        }
    }
}

impl PriceSource for Source {
    async fn price_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        match self {
            Self::Csv(s) => s.price_series(symbol, start, end).await,
            Self::Yahoo(s) => s.price_series(symbol, start, end).await,
            Self::Cached(s) => s.price_series(symbol, start, end).await,
        }
    }

    async fn price_table(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable> {
        match self {
            Self::Csv(s) => s.price_table(symbols, start, end).await,
            Self::Yahoo(s) => s.price_table(symbols, start, end).await,
            Self::Cached(s) => s.price_table(symbols, start, end).await,
        }
    }
}
