//! One-call portfolio analysis.

use meridian_data::PriceSource;
use meridian_output::{
    Report, ReportBuilder, ReportError, RiskSummary, SeriesExport, SummaryError,
    generate_risk_summary,
};
use meridian_risk::{PipelineError, PortfolioConfig, ReturnPipeline, RiskMetrics};
use thiserror::Error;

/// Analysis errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Configuration, fetch or return construction failed
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A metric was undefined for the fetched data
    #[error(transparent)]
    Summary(#[from] SummaryError),
}

/// Everything computed for one portfolio.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Tickers and their weights, in configured order
    pub holdings: Vec<(String, f64)>,
    /// Metrics engine over the portfolio and benchmark returns
    pub metrics: RiskMetrics,
    /// Scalar metrics and per-holding marginal VaR
    pub summary: RiskSummary,
    /// Daily portfolio series
    pub series: SeriesExport,
}

impl Analysis {
    /// Bundle into a timestamped report.
    pub fn report(&self) -> Result<Report, ReportError> {
        ReportBuilder::new()
            .summary(self.summary.clone())
            .holdings(self.holdings.iter().cloned())
            .series(self.series.clone())
            .build()
    }
}

/// Fetch prices for `config` from `source` and compute every metric at
/// `confidence`.
pub async fn analyze<S: PriceSource>(
    name: impl Into<String>,
    config: PortfolioConfig,
    source: &S,
    confidence: f64,
) -> Result<Analysis, AnalysisError> {
    let name = name.into();
    let mut pipeline = ReturnPipeline::new(config)?;

    pipeline.fetch(source).await?;

    let metrics = pipeline.risk_metrics()?;
    let series = SeriesExport::from_metrics(&metrics);
    tracing::info!(portfolio = %name, observations = series.len(), "computing risk summary");
    let summary = generate_risk_summary(name, &pipeline, confidence)?;

    let holdings = pipeline
        .config()
        .tickers
        .iter()
        .cloned()
        .zip(pipeline.weights().iter().copied())
        .collect();

    Ok(Analysis {
        holdings,
        metrics,
        summary,
        series,
    })
}
