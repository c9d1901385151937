//! Return Pipeline
//!
//! Turns fetched adjusted closes into the series the metrics engine consumes:
//!
//! prices → daily returns → weighted portfolio returns → cumulative growth
//!
//! Weights are matched positionally against the configured ticker list. A
//! provider that resolves only some of the tickers makes that positional
//! mapping ambiguous, so the pipeline refuses to guess and reports
//! [`PipelineError::WeightCountMismatch`] instead of renormalizing.

use crate::metrics::{DEFAULT_RISK_FREE_RATE, RiskMetrics};
use crate::series::{AssetReturns, CumulativeReturns, DateSeries, ReturnSeries};
use chrono::NaiveDate;
use meridian_data::{DataError, PriceSeries, PriceSource, PriceTable};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Return pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid portfolio configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The price source returned nothing usable
    #[error("Data unavailable: {0}")]
    DataUnavailable(#[from] DataError),

    /// Returns requested before prices were fetched
    #[error("Prices have not been fetched; call fetch() first")]
    NotFetched,

    /// None of the configured tickers came back from the price source
    #[error("None of the configured tickers {tickers:?} were found in the fetched prices")]
    NoMatchingAssets {
        /// Configured tickers
        tickers: Vec<String>,
    },

    /// Resolved asset count differs from the weight count
    #[error("Mismatch: {resolved} assets found in data, but {weights} weights provided")]
    WeightCountMismatch {
        /// Number of configured tickers present in the data
        resolved: usize,
        /// Number of configured weights
        weights: usize,
    },
}

fn default_risk_free_rate() -> f64 {
    DEFAULT_RISK_FREE_RATE
}

/// Portfolio definition and analysis window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    /// Asset identifiers, in the order weights refer to them
    pub tickers: Vec<String>,
    /// First date of the price window (inclusive)
    pub start: NaiveDate,
    /// Last date of the price window (inclusive)
    pub end: NaiveDate,
    /// One weight per ticker; equal weights when absent. Not normalized.
    #[serde(default)]
    pub weights: Option<Vec<f64>>,
    /// Benchmark index identifier, enabling beta and tracking error
    #[serde(default)]
    pub benchmark: Option<String>,
    /// Annual risk-free rate used by the Sharpe ratio
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
}

impl PortfolioConfig {
    /// Equal-weighted portfolio without a benchmark.
    pub fn new(tickers: Vec<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            tickers,
            start,
            end,
            weights: None,
            benchmark: None,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
        }
    }

    /// Set explicit weights.
    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Set the benchmark identifier.
    pub fn with_benchmark(mut self, benchmark: impl Into<String>) -> Self {
        self.benchmark = Some(benchmark.into());
        self
    }

    /// Set the annual risk-free rate.
    pub const fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    /// Check the configuration and resolve the weight vector.
    fn resolve_weights(&self) -> Result<Array1<f64>, PipelineError> {
        if self.tickers.is_empty() {
            return Err(PipelineError::Configuration(
                "At least one ticker is required".to_string(),
            ));
        }
        if let Some(repeated) = self
            .tickers
            .iter()
            .enumerate()
            .find(|&(i, t)| self.tickers[..i].contains(t))
            .map(|(_, t)| t)
        {
            return Err(PipelineError::Configuration(format!(
                "Ticker {} is listed more than once",
                repeated
            )));
        }
        if self.start >= self.end {
            return Err(PipelineError::Configuration(format!(
                "Start date {} must be before end date {}",
                self.start, self.end
            )));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(PipelineError::Configuration(format!(
                "Risk-free rate must be finite, got {}",
                self.risk_free_rate
            )));
        }

        match &self.weights {
            Some(weights) if weights.len() != self.tickers.len() => {
                Err(PipelineError::Configuration(format!(
                    "Number of weights ({}) must match number of tickers ({})",
                    weights.len(),
                    self.tickers.len()
                )))
            }
            Some(weights) if weights.iter().any(|w| !w.is_finite() || *w < 0.0) => {
                Err(PipelineError::Configuration(format!(
                    "Weights must be finite and non-negative, got {:?}",
                    weights
                )))
            }
            Some(weights) => Ok(Array1::from_vec(weights.clone())),
            None => {
                let n = self.tickers.len();
                Ok(Array1::from_elem(n, 1.0 / n as f64))
            }
        }
    }
}

/// Fetched prices held by the pipeline.
#[derive(Debug, Clone)]
struct Fetched {
    prices: PriceTable,
    benchmark: Option<PriceSeries>,
}

/// Prices-to-returns pipeline for one portfolio.
#[derive(Debug, Clone)]
pub struct ReturnPipeline {
    config: PortfolioConfig,
    weights: Array1<f64>,
    fetched: Option<Fetched>,
}

impl ReturnPipeline {
    /// Create a pipeline, validating the configuration.
    ///
    /// Fails with [`PipelineError::Configuration`] before any data is
    /// requested if the configuration is inconsistent.
    pub fn new(config: PortfolioConfig) -> Result<Self, PipelineError> {
        let weights = config.resolve_weights()?;
        Ok(Self {
            config,
            weights,
            fetched: None,
        })
    }

    /// The configuration this pipeline was built from.
    pub const fn config(&self) -> &PortfolioConfig {
        &self.config
    }

    /// Resolved weights, in configured ticker order.
    pub const fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    /// Whether prices have been fetched.
    pub const fn is_fetched(&self) -> bool {
        self.fetched.is_some()
    }

    /// Fetch prices for the configured tickers (and benchmark) from `source`
    /// and keep them for later calls.
    ///
    /// Fails with [`PipelineError::DataUnavailable`] when the source returns
    /// no prices for the tickers at all, or none for the benchmark.
    pub async fn fetch<S: PriceSource>(&mut self, source: &S) -> Result<&PriceTable, PipelineError> {
        let PortfolioConfig {
            tickers, start, end, ..
        } = &self.config;

        tracing::info!(?tickers, %start, %end, "fetching portfolio prices");
        let prices = source.price_table(tickers, *start, *end).await?;
        if prices.width() == 0 || prices.is_empty() {
            return Err(DataError::MissingData {
                symbol: tickers.join(","),
                reason: "No prices returned for any ticker".to_string(),
            }
            .into());
        }

        let benchmark = match &self.config.benchmark {
            Some(symbol) => {
                tracing::info!(%symbol, "fetching benchmark prices");
                let series = source.price_series(symbol, *start, *end).await?;
                if series.is_empty() {
                    return Err(DataError::MissingData {
                        symbol: symbol.clone(),
                        reason: "No benchmark prices returned".to_string(),
                    }
                    .into());
                }
                Some(series)
            }
            None => None,
        };

        let fetched = self.fetched.insert(Fetched { prices, benchmark });
        Ok(&fetched.prices)
    }

    /// Load prices obtained elsewhere, bypassing [`Self::fetch`].
    pub fn with_prices(mut self, prices: PriceTable, benchmark: Option<PriceSeries>) -> Self {
        self.fetched = Some(Fetched { prices, benchmark });
        self
    }

    fn fetched(&self) -> Result<&Fetched, PipelineError> {
        self.fetched.as_ref().ok_or(PipelineError::NotFetched)
    }

    /// Fetched price table.
    pub fn prices(&self) -> Result<&PriceTable, PipelineError> {
        Ok(&self.fetched()?.prices)
    }

    /// Daily simple returns for every fetched asset.
    pub fn daily_returns(&self) -> Result<AssetReturns, PipelineError> {
        Ok(AssetReturns::from_prices(&self.fetched()?.prices))
    }

    /// Daily returns of the configured tickers present in the data, in
    /// configured order.
    ///
    /// This is the per-asset table the portfolio series is built from, and
    /// the natural input to [`RiskMetrics::marginal_var`].
    pub fn resolved_returns(&self) -> Result<AssetReturns, PipelineError> {
        let daily = self.daily_returns()?;

        let resolved: Vec<String> = self
            .config
            .tickers
            .iter()
            .filter(|t| daily.contains(t))
            .cloned()
            .collect();
        tracing::debug!(?resolved, available = ?daily.symbols(), "resolved tickers");

        if resolved.is_empty() {
            return Err(PipelineError::NoMatchingAssets {
                tickers: self.config.tickers.clone(),
            });
        }
        if resolved.len() != self.weights.len() {
            tracing::warn!(
                resolved = resolved.len(),
                weights = self.weights.len(),
                "not every configured ticker resolved"
            );
            return Err(PipelineError::WeightCountMismatch {
                resolved: resolved.len(),
                weights: self.weights.len(),
            });
        }

        Ok(daily.select(&resolved))
    }

    /// Benchmark daily returns, when a benchmark is configured.
    pub fn benchmark_returns(&self) -> Result<Option<ReturnSeries>, PipelineError> {
        Ok(self
            .fetched()?
            .benchmark
            .as_ref()
            .map(DateSeries::simple_returns))
    }

    /// Weighted portfolio returns and, if configured, benchmark returns.
    pub fn portfolio_returns(&self) -> Result<(ReturnSeries, Option<ReturnSeries>), PipelineError> {
        let resolved = self.resolved_returns()?;
        let portfolio = resolved
            .weighted(&self.weights)
            .ok_or(PipelineError::WeightCountMismatch {
                resolved: resolved.symbols().len(),
                weights: self.weights.len(),
            })?;

        Ok((portfolio, self.benchmark_returns()?))
    }

    /// Growth of one unit invested in the portfolio.
    pub fn cumulative_returns(&self) -> Result<CumulativeReturns, PipelineError> {
        let (portfolio, _) = self.portfolio_returns()?;
        Ok(portfolio.cumulative())
    }

    /// Metrics engine over this pipeline's portfolio and benchmark returns.
    pub fn risk_metrics(&self) -> Result<RiskMetrics, PipelineError> {
        let (portfolio, benchmark) = self.portfolio_returns()?;
        let metrics = RiskMetrics::new(portfolio).with_risk_free_rate(self.config.risk_free_rate);
        Ok(match benchmark {
            Some(b) => metrics.with_benchmark(b),
            None => metrics,
        })
    }
}
