//! Adjusted close price containers.
//!
//! A [`PriceSeries`] holds one symbol's adjusted closes keyed by trading
//! date. A [`PriceTable`] is an ordered set of such columns; its row index is
//! the sorted union of the column dates, so a column may be missing a price
//! on some rows.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Adjusted closing prices for a single symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    prices: BTreeMap<NaiveDate, f64>,
}

impl PriceSeries {
    /// Build a series from `(date, price)` observations.
    ///
    /// Observations may arrive in any order. Fails on a repeated date or on a
    /// price that is not strictly positive and finite.
    pub fn new<I>(symbol: impl Into<String>, observations: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let symbol = symbol.into();
        let mut prices = BTreeMap::new();

        for (date, price) in observations {
            if !price.is_finite() || price <= 0.0 {
                return Err(DataError::InvalidPrice {
                    symbol,
                    date,
                    price,
                });
            }
            if prices.insert(date, price).is_some() {
                return Err(DataError::DuplicateDate { symbol, date });
            }
        }

        Ok(Self { symbol, prices })
    }

    /// Build a series from a quote frame with `date` and `adjusted_close`
    /// columns, as produced by [`crate::yahoo::YahooQuoteProvider::fetch_quotes`].
    pub fn from_frame(symbol: impl Into<String>, df: &DataFrame) -> Result<Self> {
        let dates = df.column("date")?.cast(&DataType::String)?;
        let dates = dates.str()?;
        let adj_closes = df.column("adjusted_close")?.f64()?;

        let mut observations = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let date = dates
                .get(i)
                .ok_or_else(|| DataError::Parse("Missing date".to_string()))?;
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| DataError::Parse(format!("Invalid date {}: {}", date, e)))?;
            // Null closes are holes in the provider's history, not prices.
            if let Some(price) = adj_closes.get(i) {
                observations.push((date, price));
            }
        }

        Self::new(symbol, observations)
    }

    /// Symbol this series belongs to.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Whether the series has no observations.
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Price on `date`, if one was observed.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.prices.get(&date).copied()
    }

    /// Observations in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.prices.iter().map(|(d, p)| (*d, *p))
    }

    /// Dates in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.prices.keys().copied()
    }

    /// Restrict the series to `[start, end]` inclusive.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbol: self.symbol.clone(),
            prices: self
                .prices
                .range(start..=end)
                .map(|(d, p)| (*d, *p))
                .collect(),
        }
    }
}

/// Adjusted closing prices for several symbols, indexed by trading date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    columns: Vec<PriceSeries>,
}

impl PriceTable {
    /// Build a table from per-symbol columns. Column order is preserved.
    pub fn new(columns: Vec<PriceSeries>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for column in &columns {
            if !seen.insert(column.symbol()) {
                return Err(DataError::DuplicateSymbol(column.symbol().to_string()));
            }
        }
        Ok(Self { columns })
    }

    /// Symbols in column order.
    pub fn symbols(&self) -> Vec<&str> {
        self.columns.iter().map(PriceSeries::symbol).collect()
    }

    /// Whether a column exists for `symbol`.
    pub fn contains(&self, symbol: &str) -> bool {
        self.column(symbol).is_some()
    }

    /// Column for `symbol`.
    pub fn column(&self, symbol: &str) -> Option<&PriceSeries> {
        self.columns.iter().find(|c| c.symbol() == symbol)
    }

    /// All columns in order.
    pub fn columns(&self) -> &[PriceSeries] {
        &self.columns
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Sorted union of every column's dates.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.columns
            .iter()
            .flat_map(PriceSeries::dates)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Whether the table holds no prices at all.
    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(PriceSeries::is_empty)
    }

    /// Price of `symbol` on `date`.
    pub fn price(&self, date: NaiveDate, symbol: &str) -> Option<f64> {
        self.column(symbol).and_then(|c| c.get(date))
    }
}
