//! Report generation for portfolio risk analyses.

use crate::export::SeriesExport;
use crate::summary::RiskSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Builder was given no summary.
    #[error("Report has no risk summary")]
    MissingSummary,
}

/// A timestamped risk report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report generation timestamp.
    pub timestamp: DateTime<Utc>,

    /// Tickers and weights analyzed, in configured order.
    pub holdings: Vec<(String, f64)>,

    /// Risk summary.
    pub summary: RiskSummary,

    /// Daily series, if included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<SeriesExport>,
}

impl Report {
    /// Create a new report stamped with the current time.
    pub fn new(summary: RiskSummary, holdings: Vec<(String, f64)>) -> Self {
        Self {
            timestamp: Utc::now(),
            holdings,
            summary,
            series: None,
        }
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON report to `path`.
    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Builder for creating reports.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    summary: Option<RiskSummary>,
    holdings: Vec<(String, f64)>,
    series: Option<SeriesExport>,
}

impl ReportBuilder {
    /// Create a new report builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the risk summary.
    pub fn summary(mut self, summary: RiskSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    /// Set the tickers and their weights.
    pub fn holdings<I, S>(mut self, holdings: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.holdings = holdings.into_iter().map(|(s, w)| (s.into(), w)).collect();
        self
    }

    /// Include the daily series.
    pub fn series(mut self, series: SeriesExport) -> Self {
        self.series = Some(series);
        self
    }

    /// Build the report.
    pub fn build(self) -> Result<Report, ReportError> {
        let summary = self.summary.ok_or(ReportError::MissingSummary)?;
        let mut report = Report::new(summary, self.holdings);
        report.series = self.series;
        Ok(report)
    }
}
