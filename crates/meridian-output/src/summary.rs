//! Portfolio risk summary.
//!
//! Collects the scalar metrics of a portfolio together with each holding's
//! weight and marginal VaR, and renders them for a terminal or a document.

use meridian_risk::{
    AssetMarginalVar, DEFAULT_CONFIDENCE, MetricsError, MetricsSummary, PipelineError,
    ReturnPipeline,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while summarizing a portfolio.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Pipeline could not produce returns.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// A metric could not be computed.
    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),
}

/// One holding's share of portfolio risk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HoldingContribution {
    /// Asset symbol.
    pub symbol: String,

    /// Portfolio weight.
    pub weight: f64,

    /// Beta of the asset to the portfolio.
    pub beta: f64,

    /// Marginal VaR (`beta × portfolio VaR`).
    pub marginal_var: f64,
}

impl HoldingContribution {
    /// Pair a weight with the asset's marginal VaR.
    pub fn new(weight: f64, mvar: &AssetMarginalVar) -> Self {
        Self {
            symbol: mvar.symbol.clone(),
            weight,
            beta: mvar.beta,
            marginal_var: mvar.marginal_var,
        }
    }

    /// Weighted marginal VaR; these sum to the portfolio VaR.
    pub fn component_var(&self) -> f64 {
        self.weight * self.marginal_var
    }
}

impl fmt::Display for HoldingContribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: weight {:.2}%, beta {:.3}, marginal VaR {:.2}%",
            self.symbol,
            self.weight * 100.0,
            self.beta,
            self.marginal_var * 100.0
        )
    }
}

/// Risk summary for a portfolio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskSummary {
    /// Portfolio name.
    pub name: String,

    /// Benchmark symbol, if any.
    pub benchmark: Option<String>,

    /// Scalar metrics.
    pub metrics: MetricsSummary,

    /// Per-holding marginal VaR, in ticker order.
    pub holdings: Vec<HoldingContribution>,

    /// Portfolio value for monetary VaR.
    pub portfolio_value: Option<f64>,
}

impl RiskSummary {
    /// Create a summary with no holdings breakdown.
    ///
    /// # Examples
    ///
    /// ```
    /// use meridian_output::RiskSummary;
    /// use meridian_risk::MetricsSummary;
    ///
    /// let metrics = MetricsSummary {
    ///     observations: 250,
    ///     start: None,
    ///     end: None,
    ///     risk_free_rate: 0.02,
    ///     volatility: 0.18,
    ///     confidence: 0.95,
    ///     value_at_risk: -0.021,
    ///     sharpe_ratio: 0.05,
    ///     max_drawdown: -0.12,
    ///     beta: None,
    ///     tracking_error: None,
    /// };
    ///
    /// let summary = RiskSummary::new("Growth".to_string(), metrics);
    /// assert!(summary.holdings.is_empty());
    /// ```
    pub const fn new(name: String, metrics: MetricsSummary) -> Self {
        Self {
            name,
            benchmark: None,
            metrics,
            holdings: Vec::new(),
            portfolio_value: None,
        }
    }

    /// Attach the benchmark symbol.
    pub fn with_benchmark(mut self, benchmark: impl Into<String>) -> Self {
        self.benchmark = Some(benchmark.into());
        self
    }

    /// Attach the per-holding breakdown.
    pub fn with_holdings(mut self, holdings: Vec<HoldingContribution>) -> Self {
        self.holdings = holdings;
        self
    }

    /// Set the portfolio value for monetary VaR.
    pub const fn set_portfolio_value(&mut self, value: f64) {
        self.portfolio_value = Some(value);
    }

    /// VaR in currency units, if a portfolio value is set.
    pub fn var_monetary(&self) -> Option<f64> {
        self.portfolio_value.map(|v| v * self.metrics.value_at_risk)
    }

    fn period(&self) -> String {
        match (self.metrics.start, self.metrics.end) {
            (Some(start), Some(end)) => format!("{} to {}", start, end),
            _ => "n/a".to_string(),
        }
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let m = &self.metrics;
        let mut output = String::new();

        output.push_str(&format!("\nRisk Summary: {}\n", self.name));
        output.push_str(&format!(
            "Period: {} ({} observations)\n",
            self.period(),
            m.observations
        ));
        output.push_str(&"=".repeat(80));
        output.push('\n');

        output.push_str("\nPortfolio Metrics:\n");
        output.push_str(&"-".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "  Volatility (ann.):        {:.2}%\n",
            m.volatility * 100.0
        ));
        output.push_str(&format!(
            "  {:.0}% VaR (1 day):         {:.2}%",
            m.confidence * 100.0,
            m.value_at_risk * 100.0
        ));
        if let Some(money) = self.var_monetary() {
            output.push_str(&format!(" (${:.2})", money));
        }
        output.push('\n');
        output.push_str(&format!(
            "  Sharpe Ratio (daily):     {:.4} (rf {:.2}%)\n",
            m.sharpe_ratio,
            m.risk_free_rate * 100.0
        ));
        output.push_str(&format!(
            "  Max Drawdown:             {:.2}%\n",
            m.max_drawdown * 100.0
        ));

        if let (Some(beta), Some(te)) = (m.beta, m.tracking_error) {
            let benchmark = self.benchmark.as_deref().unwrap_or("benchmark");
            output.push_str(&format!("\nRelative to {}:\n", benchmark));
            output.push_str(&"-".repeat(80));
            output.push('\n');
            output.push_str(&format!("  Beta:                     {:.4}\n", beta));
            output.push_str(&format!(
                "  Tracking Error (ann.):    {:.2}%\n",
                te * 100.0
            ));
        }

        if !self.holdings.is_empty() {
            output.push_str(&format!(
                "\nMarginal VaR ({:.0}%):\n",
                DEFAULT_CONFIDENCE * 100.0
            ));
            output.push_str(&"-".repeat(80));
            output.push('\n');
            output.push_str(&format!(
                "{:<20} {:>12} {:>12} {:>12} {:>12}\n",
                "Symbol", "Weight", "Beta", "MVaR", "Component"
            ));
            output.push_str(&"-".repeat(80));
            output.push('\n');

            for holding in &self.holdings {
                output.push_str(&format!(
                    "{:<20} {:>11.2}% {:>12.4} {:>11.2}% {:>11.2}%\n",
                    holding.symbol,
                    holding.weight * 100.0,
                    holding.beta,
                    holding.marginal_var * 100.0,
                    holding.component_var() * 100.0
                ));
            }
        }

        output.push_str(&"=".repeat(80));
        output.push('\n');

        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let m = &self.metrics;
        let mut output = String::new();

        output.push_str(&format!("# Risk Summary: {}\n\n", self.name));
        output.push_str(&format!(
            "**Period:** {} ({} observations)\n\n",
            self.period(),
            m.observations
        ));

        output.push_str("## Portfolio Metrics\n\n");
        output.push_str(&format!(
            "- **Volatility (ann.):** {:.2}%\n",
            m.volatility * 100.0
        ));
        output.push_str(&format!(
            "- **{:.0}% VaR (1 day):** {:.2}%",
            m.confidence * 100.0,
            m.value_at_risk * 100.0
        ));
        if let Some(money) = self.var_monetary() {
            output.push_str(&format!(" (${:.2})", money));
        }
        output.push('\n');
        output.push_str(&format!(
            "- **Sharpe Ratio (daily):** {:.4}\n",
            m.sharpe_ratio
        ));
        output.push_str(&format!(
            "- **Max Drawdown:** {:.2}%\n",
            m.max_drawdown * 100.0
        ));
        if let Some(beta) = m.beta {
            output.push_str(&format!("- **Beta:** {:.4}\n", beta));
        }
        if let Some(te) = m.tracking_error {
            output.push_str(&format!("- **Tracking Error (ann.):** {:.2}%\n", te * 100.0));
        }
        output.push('\n');

        if !self.holdings.is_empty() {
            output.push_str("## Marginal VaR\n\n");
            output.push_str("| Symbol | Weight | Beta | Marginal VaR | Component VaR |\n");
            output.push_str("|--------|--------|------|--------------|---------------|\n");

            for holding in &self.holdings {
                output.push_str(&format!(
                    "| {} | {:.2}% | {:.4} | {:.2}% | {:.2}% |\n",
                    holding.symbol,
                    holding.weight * 100.0,
                    holding.beta,
                    holding.marginal_var * 100.0,
                    holding.component_var() * 100.0
                ));
            }
        }

        output
    }
}

impl fmt::Display for RiskSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.metrics;
        writeln!(f, "Risk Summary: {} ({})", self.name, self.period())?;
        writeln!(f, "  Volatility: {:.2}%", m.volatility * 100.0)?;
        writeln!(
            f,
            "  {:.0}% VaR: {:.2}%",
            m.confidence * 100.0,
            m.value_at_risk * 100.0
        )?;
        writeln!(f, "  Sharpe Ratio: {:.4}", m.sharpe_ratio)?;
        writeln!(f, "  Max Drawdown: {:.2}%", m.max_drawdown * 100.0)?;
        if let Some(beta) = m.beta {
            writeln!(f, "  Beta: {:.4}", beta)?;
        }
        if let Some(te) = m.tracking_error {
            writeln!(f, "  Tracking Error: {:.2}%", te * 100.0)?;
        }
        Ok(())
    }
}

/// Summarize a fetched pipeline: scalar metrics at `confidence` plus the
/// marginal VaR of every holding.
///
/// Fails if the pipeline has not been fetched, its tickers do not resolve,
/// or any metric is undefined for the data.
pub fn generate_risk_summary(
    name: String,
    pipeline: &ReturnPipeline,
    confidence: f64,
) -> Result<RiskSummary, SummaryError> {
    let metrics = pipeline.risk_metrics()?;
    let assets = pipeline.resolved_returns()?;

    let holdings = metrics
        .marginal_var(&assets)?
        .iter()
        .zip(pipeline.weights())
        .map(|(mvar, &weight)| HoldingContribution::new(weight, mvar))
        .collect();

    let mut summary =
        RiskSummary::new(name, metrics.summary(confidence)?).with_holdings(holdings);
    if let Some(benchmark) = &pipeline.config().benchmark {
        summary = summary.with_benchmark(benchmark.clone());
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn metrics(beta: Option<f64>) -> MetricsSummary {
        MetricsSummary {
            observations: 2,
            start: NaiveDate::from_ymd_opt(2024, 1, 2),
            end: NaiveDate::from_ymd_opt(2024, 1, 3),
            risk_free_rate: 0.02,
            volatility: 0.0835,
            confidence: 0.95,
            value_at_risk: -0.0038,
            sharpe_ratio: 0.6,
            max_drawdown: -0.004545,
            beta,
            tracking_error: beta.map(|_| 0.05),
        }
    }

    fn holdings() -> Vec<HoldingContribution> {
        vec![
            HoldingContribution {
                symbol: "AAA".to_string(),
                weight: 0.5,
                beta: 1.2,
                marginal_var: -0.00456,
            },
            HoldingContribution {
                symbol: "BBB".to_string(),
                weight: 0.5,
                beta: 0.8,
                marginal_var: -0.00304,
            },
        ]
    }

    #[test]
    fn test_holding_contribution() {
        let mvar = AssetMarginalVar {
            symbol: "AAA".to_string(),
            beta: 1.5,
            marginal_var: -0.03,
        };
        let holding = HoldingContribution::new(0.4, &mvar);
        assert_eq!(holding.symbol, "AAA");
        assert!((holding.component_var() + 0.012).abs() < 1e-12);
        assert!(holding.to_string().starts_with("AAA: weight 40.00%"));
    }

    #[test]
    fn test_component_var_sums_to_portfolio_var() {
        let summary = RiskSummary::new("Test".to_string(), metrics(None)).with_holdings(holdings());
        let total: f64 = summary.holdings.iter().map(|h| h.component_var()).sum();
        assert!((total - summary.metrics.value_at_risk).abs() < 1e-12);
    }

    #[test]
    fn test_var_monetary() {
        let mut summary = RiskSummary::new("Test".to_string(), metrics(None));
        assert_eq!(summary.var_monetary(), None);

        assert!(!summary.to_ascii_table().contains('$'));

        summary.set_portfolio_value(1_000_000.0);
        assert!((summary.var_monetary().unwrap() + 3_800.0).abs() < 1e-6);
        assert!(summary.to_ascii_table().contains("($-3800.00)"));
        assert!(summary.to_markdown().contains("($-3800.00)"));
    }

    #[test]
    fn test_ascii_table() {
        let summary = RiskSummary::new("Tech".to_string(), metrics(Some(1.1)))
            .with_benchmark("^GSPC")
            .with_holdings(holdings());
        let table = summary.to_ascii_table();

        assert!(table.contains("Risk Summary: Tech"));
        assert!(table.contains("2024-01-02 to 2024-01-03"));
        assert!(table.contains("Relative to ^GSPC"));
        assert!(table.contains("Marginal VaR (95%)"));
        assert!(table.contains("AAA"));
        assert!(table.contains("BBB"));
    }

    #[test]
    fn test_ascii_table_without_benchmark() {
        let table = RiskSummary::new("Solo".to_string(), metrics(None)).to_ascii_table();
        assert!(!table.contains("Relative to"));
        assert!(!table.contains("Marginal VaR"));
    }

    #[test]
    fn test_markdown() {
        let markdown = RiskSummary::new("Tech".to_string(), metrics(Some(1.1)))
            .with_holdings(holdings())
            .to_markdown();

        assert!(markdown.starts_with("# Risk Summary: Tech"));
        assert!(markdown.contains("- **Beta:** 1.1000"));
        assert!(markdown.contains("| AAA | 50.00% | 1.2000 |"));
    }

    #[test]
    fn test_display() {
        let text = RiskSummary::new("Tech".to_string(), metrics(None)).to_string();
        assert!(text.contains("95% VaR: -0.38%"));
        assert!(!text.contains("Beta"));
    }
}
