//! Risk Metrics
//!
//! Portfolio risk and performance statistics over daily simple returns.
//!
//! Conventions:
//! - Annualization assumes 252 trading days per year.
//! - Volatility, Sharpe ratio and tracking error use the sample standard
//!   deviation (divisor N−1).
//! - Beta and marginal VaR use population covariance and variance
//!   (divisor N).
//! - Historical VaR is the empirical `(1 − c)` percentile of raw returns,
//!   linearly interpolated between order statistics. A loss shows up as a
//!   negative number.
//!
//! Whenever a benchmark or asset table is involved, series are first
//! inner-joined on date, never zipped by position.

use crate::series::{AssetReturns, CumulativeReturns, DateSeries, ReturnSeries};
use crate::stats;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trading days used to annualize daily statistics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Confidence level used when none is given.
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// Annual risk-free rate used when none is given.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

/// Standard deviations below this are treated as zero.
const MIN_DISPERSION: f64 = 1e-12;

/// Risk metric errors
#[derive(Debug, Error, PartialEq)]
pub enum MetricsError {
    /// Metric needs a benchmark series but none was supplied
    #[error("Benchmark returns are required to compute {metric}")]
    BenchmarkRequired {
        /// Metric that was requested
        metric: &'static str,
    },

    /// Too few observations, or no dispersion, for the metric to be defined
    #[error("Insufficient data for {metric}: {reason}")]
    InsufficientData {
        /// Metric that was requested
        metric: &'static str,
        /// What was missing
        reason: String,
    },

    /// Asset table length differs from the portfolio series length
    #[error("Asset returns have {actual} rows but portfolio returns have {expected}")]
    LengthMismatch {
        /// Portfolio series length
        expected: usize,
        /// Asset table row count
        actual: usize,
    },

    /// Parameter outside its valid range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

fn too_few(metric: &'static str, required: usize, actual: usize) -> MetricsError {
    MetricsError::InsufficientData {
        metric,
        reason: format!("need at least {} observations, got {}", required, actual),
    }
}

fn no_dispersion(metric: &'static str, what: &str) -> MetricsError {
    MetricsError::InsufficientData {
        metric,
        reason: format!("{} has zero variance", what),
    }
}

/// Marginal VaR of a single asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMarginalVar {
    /// Asset identifier
    pub symbol: String,
    /// Beta of the asset's returns to the portfolio's returns
    pub beta: f64,
    /// `beta × portfolio VaR`
    pub marginal_var: f64,
}

/// All scalar metrics for one portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    /// Number of portfolio return observations
    pub observations: usize,
    /// First return date
    pub start: Option<NaiveDate>,
    /// Last return date
    pub end: Option<NaiveDate>,
    /// Annual risk-free rate used for the Sharpe ratio
    pub risk_free_rate: f64,
    /// Annualized volatility
    pub volatility: f64,
    /// Confidence level of `value_at_risk`
    pub confidence: f64,
    /// Historical VaR at `confidence`
    pub value_at_risk: f64,
    /// Daily Sharpe ratio
    pub sharpe_ratio: f64,
    /// Maximum drawdown (≤ 0)
    pub max_drawdown: f64,
    /// Beta to the benchmark, if one was supplied
    pub beta: Option<f64>,
    /// Annualized tracking error, if a benchmark was supplied
    pub tracking_error: Option<f64>,
}

/// Risk metrics engine.
///
/// Holds the portfolio return series, an optional benchmark return series and
/// the risk-free rate. Every metric is a pure function of those inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskMetrics {
    portfolio: ReturnSeries,
    benchmark: Option<ReturnSeries>,
    risk_free_rate: f64,
}

impl RiskMetrics {
    /// Engine over `portfolio` returns with the default risk-free rate and no
    /// benchmark.
    pub const fn new(portfolio: ReturnSeries) -> Self {
        Self {
            portfolio,
            benchmark: None,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
        }
    }

    /// Attach benchmark returns, enabling beta and tracking error.
    pub fn with_benchmark(mut self, benchmark: ReturnSeries) -> Self {
        self.benchmark = Some(benchmark);
        self
    }

    /// Set the annual risk-free rate.
    pub const fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    /// Portfolio returns.
    pub const fn portfolio_returns(&self) -> &ReturnSeries {
        &self.portfolio
    }

    /// Benchmark returns, if any.
    pub const fn benchmark_returns(&self) -> Option<&ReturnSeries> {
        self.benchmark.as_ref()
    }

    /// Annual risk-free rate.
    pub const fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    fn benchmark(&self, metric: &'static str) -> Result<&ReturnSeries, MetricsError> {
        self.benchmark
            .as_ref()
            .ok_or(MetricsError::BenchmarkRequired { metric })
    }

    /// Annualized volatility: sample standard deviation × √252.
    pub fn volatility(&self) -> Result<f64, MetricsError> {
        let returns = self.portfolio.values();
        let std = stats::sample_std(&returns).ok_or_else(|| too_few("volatility", 2, returns.len()))?;
        Ok(std * TRADING_DAYS_PER_YEAR.sqrt())
    }

    /// Historical VaR: the `(1 − confidence)` percentile of portfolio
    /// returns.
    ///
    /// `confidence` must lie strictly between 0 and 1.
    pub fn value_at_risk(&self, confidence: f64) -> Result<f64, MetricsError> {
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(MetricsError::InvalidParameter(format!(
                "confidence must be in (0, 1), got {}",
                confidence
            )));
        }
        let returns = self.portfolio.values();
        stats::percentile(&returns, 1.0 - confidence).ok_or_else(|| too_few("value at risk", 1, 0))
    }

    /// Sharpe ratio of daily returns: `(mean − rf / 252) / std`.
    pub fn sharpe_ratio(&self) -> Result<f64, MetricsError> {
        let returns = self.portfolio.values();
        let mean = stats::mean(&returns).ok_or_else(|| too_few("sharpe ratio", 2, 0))?;
        let std =
            stats::sample_std(&returns).ok_or_else(|| too_few("sharpe ratio", 2, returns.len()))?;
        if std < MIN_DISPERSION {
            return Err(no_dispersion("sharpe ratio", "portfolio returns"));
        }

        let excess = mean - self.risk_free_rate / TRADING_DAYS_PER_YEAR;
        Ok(excess / std)
    }

    /// Beta to the benchmark: `cov(p, b) / var(b)` over dates both series
    /// share, with population statistics.
    pub fn beta(&self) -> Result<f64, MetricsError> {
        let benchmark = self.benchmark("beta")?;
        let (p, b) = self.portfolio.align(benchmark);
        if p.len() < 2 {
            return Err(too_few("beta", 2, p.len()));
        }

        let covariance = stats::population_covariance(&p, &b).ok_or_else(|| too_few("beta", 2, 0))?;
        let variance = stats::population_variance(&b).ok_or_else(|| too_few("beta", 2, 0))?;
        if variance.sqrt() < MIN_DISPERSION {
            return Err(no_dispersion("beta", "benchmark returns"));
        }

        Ok(covariance / variance)
    }

    /// Growth of one unit invested in the portfolio.
    pub fn cumulative_returns(&self) -> CumulativeReturns {
        self.portfolio.cumulative()
    }

    /// Drawdown from the running peak of the growth curve on each date.
    pub fn drawdown_series(&self) -> DateSeries {
        let mut peak = f64::NEG_INFINITY;
        self.cumulative_returns()
            .iter()
            .map(|(date, value)| {
                peak = peak.max(value);
                (date, (value - peak) / peak)
            })
            .collect()
    }

    /// Maximum drawdown: the deepest peak-to-trough decline, as a fraction
    /// in `[−1, 0]`.
    pub fn max_drawdown(&self) -> Result<f64, MetricsError> {
        self.drawdown_series()
            .iter()
            .map(|(_, dd)| dd)
            .reduce(f64::min)
            .ok_or_else(|| too_few("max drawdown", 1, 0))
    }

    /// Annualized tracking error: sample standard deviation of
    /// `p − b` over shared dates × √252.
    pub fn tracking_error(&self) -> Result<f64, MetricsError> {
        let benchmark = self.benchmark("tracking error")?;
        let (p, b) = self.portfolio.align(benchmark);
        let active: Vec<f64> = p.iter().zip(&b).map(|(p, b)| p - b).collect();

        let std = stats::sample_std(&active)
            .ok_or_else(|| too_few("tracking error", 2, active.len()))?;
        Ok(std * TRADING_DAYS_PER_YEAR.sqrt())
    }

    /// Marginal VaR of every asset in `assets`.
    ///
    /// Each asset's beta to the portfolio (population statistics, dates
    /// aligned with the portfolio series) is scaled by the portfolio VaR at
    /// [`DEFAULT_CONFIDENCE`]. When `assets` is the table the portfolio was
    /// built from, `Σ wᵢ · MVaRᵢ` reproduces the portfolio VaR.
    ///
    /// The table must have exactly as many rows as the portfolio series;
    /// alignment only removes dates missing from either side.
    pub fn marginal_var(&self, assets: &AssetReturns) -> Result<Vec<AssetMarginalVar>, MetricsError> {
        if assets.len() != self.portfolio.len() {
            return Err(MetricsError::LengthMismatch {
                expected: self.portfolio.len(),
                actual: assets.len(),
            });
        }

        let (rows, portfolio): (Vec<usize>, Vec<f64>) = assets
            .dates()
            .iter()
            .enumerate()
            .filter_map(|(i, date)| self.portfolio.get(*date).map(|p| (i, p)))
            .unzip();
        if rows.len() < 2 {
            return Err(too_few("marginal VaR", 2, rows.len()));
        }

        let variance =
            stats::population_variance(&portfolio).ok_or_else(|| too_few("marginal VaR", 2, 0))?;
        if variance.sqrt() < MIN_DISPERSION {
            return Err(no_dispersion("marginal VaR", "portfolio returns"));
        }

        let portfolio_var = self.value_at_risk(DEFAULT_CONFIDENCE)?;

        assets
            .symbols()
            .iter()
            .enumerate()
            .map(|(j, symbol)| {
                let column = assets.values().column(j);
                let asset: Vec<f64> = rows.iter().map(|&i| column[i]).collect();
                let covariance = stats::population_covariance(&asset, &portfolio)
                    .ok_or_else(|| too_few("marginal VaR", 2, 0))?;
                let beta = covariance / variance;
                Ok(AssetMarginalVar {
                    symbol: symbol.clone(),
                    beta,
                    marginal_var: beta * portfolio_var,
                })
            })
            .collect()
    }

    /// Every scalar metric at once. Benchmark metrics are `None` without a
    /// benchmark; any other failure is returned.
    pub fn summary(&self, confidence: f64) -> Result<MetricsSummary, MetricsError> {
        let span = self.portfolio.span();
        let (beta, tracking_error) = if self.benchmark.is_some() {
            (Some(self.beta()?), Some(self.tracking_error()?))
        } else {
            (None, None)
        };

        Ok(MetricsSummary {
            observations: self.portfolio.len(),
            start: span.map(|(s, _)| s),
            end: span.map(|(_, e)| e),
            risk_free_rate: self.risk_free_rate,
            volatility: self.volatility()?,
            confidence,
            value_at_risk: self.value_at_risk(confidence)?,
            sharpe_ratio: self.sharpe_ratio()?,
            max_drawdown: self.max_drawdown()?,
            beta,
            tracking_error,
        })
    }
}
