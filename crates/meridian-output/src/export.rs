//! CSV and JSON export of the daily portfolio series.

use chrono::NaiveDate;
use meridian_risk::RiskMetrics;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Writer produced bytes that are not UTF-8.
    #[error("Invalid UTF-8 in output: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(Self::Csv),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(format!(
                "unsupported file extension {:?}",
                other.unwrap_or_default()
            ))),
        }
    }
}

/// One date of the portfolio series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesRecord {
    /// Return date.
    pub date: NaiveDate,

    /// Portfolio daily return.
    pub portfolio_return: f64,

    /// Benchmark daily return, blank when the benchmark has no quote.
    pub benchmark_return: Option<f64>,

    /// Growth of one unit invested at the start.
    pub cumulative_return: f64,

    /// Decline from the running peak of the growth curve.
    pub drawdown: f64,
}

/// Date-indexed portfolio series for plotting or further analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeriesExport {
    /// Rows in date order.
    pub records: Vec<SeriesRecord>,
}

impl SeriesExport {
    /// Collect returns, growth and drawdown from a metrics engine.
    pub fn from_metrics(metrics: &RiskMetrics) -> Self {
        let cumulative = metrics.cumulative_returns();
        let drawdown = metrics.drawdown_series();
        let benchmark = metrics.benchmark_returns();

        // Growth and drawdown share the portfolio's dates.
        let records = metrics
            .portfolio_returns()
            .iter()
            .zip(cumulative.values())
            .zip(drawdown.values())
            .map(|(((date, r), growth), dd)| SeriesRecord {
                date,
                portfolio_return: r,
                benchmark_return: benchmark.and_then(|b| b.get(date)),
                cumulative_return: growth,
                drawdown: dd,
            })
            .collect();

        Self { records }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Trait for types that can be exported.
pub trait Exporter {
    /// Export to a string in the specified format.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export to a file in the specified format.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn csv_string<T: Serialize>(records: impl IntoIterator<Item = T>) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

impl Exporter for SeriesExport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_string(&self.records),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_risk::ReturnSeries;
    use rstest::rstest;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn metrics() -> RiskMetrics {
        let portfolio: ReturnSeries = vec![(d(2), 0.10), (d(3), -0.10), (d(4), 0.05)]
            .into_iter()
            .collect();
        let benchmark: ReturnSeries = vec![(d(2), 0.02), (d(4), 0.01)].into_iter().collect();
        RiskMetrics::new(portfolio).with_benchmark(benchmark)
    }

    #[rstest]
    #[case(ExportFormat::Csv, "csv")]
    #[case(ExportFormat::Json, "json")]
    #[case(ExportFormat::PrettyJson, "json")]
    fn test_export_format_extension(#[case] format: ExportFormat, #[case] ext: &str) {
        assert_eq!(format.extension(), ext);
    }

    #[rstest]
    #[case("out.csv", Some(ExportFormat::Csv))]
    #[case("out.JSON", Some(ExportFormat::PrettyJson))]
    #[case("out.xlsx", None)]
    #[case("out", None)]
    fn test_export_format_from_path(#[case] path: &str, #[case] expected: Option<ExportFormat>) {
        assert_eq!(ExportFormat::from_path(Path::new(path)).ok(), expected);
    }

    #[test]
    fn test_series_from_metrics() {
        let export = SeriesExport::from_metrics(&metrics());
        assert_eq!(export.len(), 3);

        let first = &export.records[0];
        assert_eq!(first.date, d(2));
        assert_eq!(first.benchmark_return, Some(0.02));
        assert!((first.cumulative_return - 1.10).abs() < 1e-12);
        assert_eq!(first.drawdown, 0.0);

        let second = &export.records[1];
        assert_eq!(second.benchmark_return, None);
        assert!((second.cumulative_return - 0.99).abs() < 1e-12);
        assert!((second.drawdown + 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_series_csv() {
        let csv = SeriesExport::from_metrics(&metrics())
            .export_to_string(ExportFormat::Csv)
            .unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "date,portfolio_return,benchmark_return,cumulative_return,drawdown"
        );
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("2024-01-02,0.1,0.02,"));
        // Missing benchmark quote leaves an empty cell.
        assert!(lines[2].starts_with("2024-01-03,-0.1,,"));
    }

    #[test]
    fn test_series_json() {
        let export = SeriesExport::from_metrics(&metrics());
        let json = export.export_to_string(ExportFormat::Json).unwrap();
        let parsed: SeriesExport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), export.len());
        assert_eq!(parsed.records[2].date, d(4));
        assert_eq!(parsed.records[1].benchmark_return, None);
    }

    #[test]
    fn test_empty_series() {
        let export = SeriesExport::default();
        assert!(export.is_empty());
        assert_eq!(export.export_to_string(ExportFormat::Csv).unwrap(), "");
    }
}
