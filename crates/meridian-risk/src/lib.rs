#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/meridian/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod metrics;
pub mod pipeline;
pub mod series;
pub mod stats;

// Re-export main types
pub use metrics::{
    AssetMarginalVar, DEFAULT_CONFIDENCE, DEFAULT_RISK_FREE_RATE, MetricsError, MetricsSummary,
    RiskMetrics, TRADING_DAYS_PER_YEAR,
};
pub use pipeline::{PipelineError, PortfolioConfig, ReturnPipeline};
pub use series::{AssetReturns, CumulativeReturns, DateSeries, ReturnSeries};
