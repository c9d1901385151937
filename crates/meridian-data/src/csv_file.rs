//! Price source reading a wide CSV file.
//!
//! Expected layout: a `date` column of ISO dates followed by one column per
//! symbol. Empty cells are missing prices. Symbol headers are uppercased.
//!
//! ```text
//! date,AAPL,MSFT,^GSPC
//! 2024-01-02,185.64,370.87,4742.83
//! 2024-01-03,184.25,,4704.81
//! ```

use crate::error::{DataError, Result};
use crate::prices::PriceSeries;
use crate::source::{InMemoryPriceSource, PriceSource};
use chrono::NaiveDate;
use std::io::Read;
use std::path::Path;

/// Price source loaded once from a CSV file.
#[derive(Debug, Clone)]
pub struct CsvPriceSource {
    inner: InMemoryPriceSource,
}

impl CsvPriceSource {
    /// Load prices from a CSV file on disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Load prices from any reader producing CSV text.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();

        if headers.get(0).map(str::trim) != Some("date") {
            return Err(DataError::Parse(
                "First CSV column must be `date`".to_string(),
            ));
        }

        // Symbols are matched case-insensitively, like tickers on the command line.
        let symbols: Vec<String> = headers
            .iter()
            .skip(1)
            .map(|h| h.trim().to_uppercase())
            .collect();
        if let Some(repeated) = symbols
            .iter()
            .enumerate()
            .find(|&(j, s)| symbols[..j].contains(s))
            .map(|(_, s)| s)
        {
            return Err(DataError::DuplicateSymbol(repeated.clone()));
        }
        let mut observations: Vec<Vec<(NaiveDate, f64)>> = vec![Vec::new(); symbols.len()];

        for record in rdr.records() {
            let record = record?;
            let raw_date = record.get(0).unwrap_or_default().trim();
            let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
                .map_err(|e| DataError::Parse(format!("Invalid date {}: {}", raw_date, e)))?;

            for (j, cell) in record.iter().skip(1).enumerate() {
                let cell = cell.trim();
                if cell.is_empty() || j >= symbols.len() {
                    continue;
                }
                let price: f64 = cell.parse().map_err(|_| {
                    DataError::Parse(format!("Invalid price {} for {}", cell, symbols[j]))
                })?;
                observations[j].push((date, price));
            }
        }

        let mut inner = InMemoryPriceSource::new();
        for (symbol, obs) in symbols.into_iter().zip(observations) {
            inner.insert(PriceSeries::new(symbol, obs)?);
        }

        tracing::debug!(symbols = inner.symbols().count(), "loaded CSV prices");
        Ok(Self { inner })
    }
}

impl PriceSource for CsvPriceSource {
    async fn price_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        self.inner.price_series(symbol, start, end).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "date,AAA,BBB\n\
                       2024-01-01,100,50\n\
                       2024-01-02,110,\n\
                       2024-01-03,99,60\n";

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[tokio::test]
    async fn test_empty_cells_are_missing() {
        let source = CsvPriceSource::from_reader(CSV.as_bytes()).unwrap();
        let bbb = source.price_series("BBB", d(1), d(3)).await.unwrap();
        assert_eq!(bbb.len(), 2);
        assert_eq!(bbb.get(d(2)), None);
    }

    #[tokio::test]
    async fn test_table_from_csv() {
        let source = CsvPriceSource::from_reader(CSV.as_bytes()).unwrap();
        let symbols = vec!["AAA".to_string(), "BBB".to_string()];
        let table = source.price_table(&symbols, d(1), d(3)).await.unwrap();
        assert_eq!(table.dates().len(), 3);
        assert_eq!(table.price(d(3), "AAA"), Some(99.0));
    }

    #[tokio::test]
    async fn test_headers_are_uppercased() {
        let source = CsvPriceSource::from_reader("date, aapl ,Msft\n2024-01-01,1,2\n".as_bytes())
            .unwrap();
        let symbols = vec!["AAPL".to_string(), "MSFT".to_string()];
        let table = source.price_table(&symbols, d(1), d(3)).await.unwrap();
        assert_eq!(table.symbols(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_rejects_headers_equal_up_to_case() {
        let result = CsvPriceSource::from_reader("date,AAA,aaa\n2024-01-01,1,2\n".as_bytes());
        assert!(matches!(result, Err(DataError::DuplicateSymbol(s)) if s == "AAA"));
    }

    #[test]
    fn test_rejects_missing_date_header() {
        let result = CsvPriceSource::from_reader("day,AAA\n2024-01-01,1\n".as_bytes());
        assert!(matches!(result, Err(DataError::Parse(_))));
    }

    #[test]
    fn test_rejects_negative_price() {
        let result = CsvPriceSource::from_reader("date,AAA\n2024-01-01,-1\n".as_bytes());
        assert!(matches!(result, Err(DataError::InvalidPrice { .. })));
    }
}
