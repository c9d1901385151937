//! Date-indexed return series and per-asset return tables.

use chrono::NaiveDate;
use meridian_data::{PriceSeries, PriceTable};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered `(date, value)` observations with unique dates.
///
/// Used for daily returns, portfolio returns, and cumulative growth curves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateSeries {
    observations: BTreeMap<NaiveDate, f64>,
}

/// Daily simple returns.
pub type ReturnSeries = DateSeries;

/// Growth of one unit invested at the start of a return series.
pub type CumulativeReturns = DateSeries;

impl DateSeries {
    /// Simple returns of a price series. The first date has no return and is
    /// dropped, so `N` prices yield `N − 1` returns.
    pub fn simple_returns(prices: &PriceSeries) -> Self {
        let points: Vec<_> = prices.iter().collect();
        points
            .windows(2)
            .map(|w| (w[1].0, (w[1].1 - w[0].1) / w[0].1))
            .collect()
    }

    /// Compounded growth curve: `value[t] = Π (1 + r)` up to and including `t`.
    pub fn cumulative(&self) -> CumulativeReturns {
        let mut growth = 1.0;
        self.iter()
            .map(|(date, r)| {
                growth *= 1.0 + r;
                (date, growth)
            })
            .collect()
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Value on `date`.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.observations.get(&date).copied()
    }

    /// Observations in date order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.observations.iter().map(|(d, v)| (*d, *v))
    }

    /// Dates in ascending order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.keys().copied().collect()
    }

    /// Values in date order.
    pub fn values(&self) -> Vec<f64> {
        self.observations.values().copied().collect()
    }

    /// First and last date, if any.
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.observations.keys().next()?;
        let last = self.observations.keys().next_back()?;
        Some((*first, *last))
    }

    /// Inner join on date: paired values for every date present in both
    /// series, in date order.
    pub fn align(&self, other: &Self) -> (Vec<f64>, Vec<f64>) {
        self.iter()
            .filter_map(|(date, v)| other.get(date).map(|o| (v, o)))
            .unzip()
    }
}

impl FromIterator<(NaiveDate, f64)> for DateSeries {
    /// Later observations for a repeated date replace earlier ones.
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        Self {
            observations: iter.into_iter().collect(),
        }
    }
}

/// Rectangular table of daily returns: one row per date, one column per
/// asset. Every cell is defined.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetReturns {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    values: Array2<f64>,
}

impl AssetReturns {
    /// Build a table from parts.
    ///
    /// Returns `None` unless `values` is `dates.len() × symbols.len()`.
    pub fn new(dates: Vec<NaiveDate>, symbols: Vec<String>, values: Array2<f64>) -> Option<Self> {
        (values.dim() == (dates.len(), symbols.len())).then_some(Self {
            dates,
            symbols,
            values,
        })
    }

    /// Daily simple returns of every column of `prices`.
    ///
    /// Row `t` compares each asset's price on table date `t` with its price
    /// on table date `t − 1`. The first date is dropped, and so is any date
    /// on which some asset lacks either price: missing returns are never
    /// imputed.
    pub fn from_prices(prices: &PriceTable) -> Self {
        let table_dates = prices.dates();
        let columns = prices.columns();

        let mut dates = Vec::new();
        let mut rows: Vec<Vec<f64>> = Vec::new();

        for pair in table_dates.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            let row: Option<Vec<f64>> = columns
                .iter()
                .map(|c| {
                    let p0 = c.get(prev)?;
                    let p1 = c.get(curr)?;
                    Some((p1 - p0) / p0)
                })
                .collect();

            if let Some(row) = row {
                dates.push(curr);
                rows.push(row);
            }
        }

        let dropped = table_dates.len().saturating_sub(1) - dates.len();
        if dropped > 0 {
            tracing::debug!(dropped, "dropped dates with incomplete prices");
        }

        let values = Array2::from_shape_fn((rows.len(), columns.len()), |(i, j)| rows[i][j]);

        Self {
            dates,
            symbols: columns.iter().map(|c| c.symbol().to_string()).collect(),
            values,
        }
    }

    /// Number of rows (dates).
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Row dates.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Column symbols.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Returns matrix (rows × columns).
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Whether a column exists for `symbol`.
    pub fn contains(&self, symbol: &str) -> bool {
        self.column_index(symbol).is_some()
    }

    fn column_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// Columns for `symbols`, in the given order. Unknown symbols are
    /// skipped.
    pub fn select(&self, symbols: &[String]) -> Self {
        let indices: Vec<usize> = symbols
            .iter()
            .filter_map(|s| self.column_index(s))
            .collect();

        Self {
            dates: self.dates.clone(),
            symbols: indices.iter().map(|&j| self.symbols[j].clone()).collect(),
            values: self.values.select(ndarray::Axis(1), &indices),
        }
    }

    /// Per-date weighted sum of the columns.
    ///
    /// Returns `None` when the weight count differs from the column count.
    pub fn weighted(&self, weights: &Array1<f64>) -> Option<ReturnSeries> {
        if weights.len() != self.symbols.len() {
            return None;
        }
        let combined = self.values.dot(weights);
        Some(self.dates.iter().copied().zip(combined.iter().copied()).collect())
    }
}
