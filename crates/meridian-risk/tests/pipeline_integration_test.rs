//! End-to-end tests: prices through the pipeline into the metrics engine.

use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate};
use meridian_data::{InMemoryPriceSource, PriceSeries};
use meridian_risk::{
    DEFAULT_CONFIDENCE, MetricsError, PipelineError, PortfolioConfig, ReturnPipeline,
};

const DAYS: usize = 60;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
}

/// Deterministic wiggly price path.
fn path(symbol: &str, phase: f64, drift: f64) -> PriceSeries {
    let mut price = 100.0;
    let observations = (0..DAYS).map(|i| {
        if i > 0 {
            price *= 1.0 + drift + 0.02 * ((i as f64) * 0.7 + phase).sin();
        }
        (start() + Duration::days(i as i64), price)
    });
    PriceSeries::new(symbol, observations.collect::<Vec<_>>()).unwrap()
}

fn source() -> InMemoryPriceSource {
    InMemoryPriceSource::new()
        .with_series(path("AAPL", 0.0, 0.001))
        .with_series(path("MSFT", 1.0, 0.0005))
        .with_series(path("GOOGL", 2.0, -0.0002))
        .with_series(path("^GSPC", 0.5, 0.0004))
}

fn config() -> PortfolioConfig {
    PortfolioConfig::new(
        vec!["AAPL".into(), "MSFT".into(), "GOOGL".into()],
        start(),
        start() + Duration::days(DAYS as i64),
    )
    .with_weights(vec![0.5, 0.3, 0.2])
    .with_benchmark("^GSPC")
}

#[tokio::test]
async fn test_full_risk_workflow() {
    let mut pipeline = ReturnPipeline::new(config()).unwrap();
    let prices = pipeline.fetch(&source()).await.unwrap();
    assert_eq!(prices.width(), 3);

    let (portfolio, benchmark) = pipeline.portfolio_returns().unwrap();
    assert_eq!(portfolio.len(), DAYS - 1);
    assert_eq!(benchmark.as_ref().map(|b| b.len()), Some(DAYS - 1));

    let cumulative = pipeline.cumulative_returns().unwrap();
    let mut previous = 1.0;
    for (date, growth) in cumulative.iter() {
        let r = portfolio.get(date).unwrap();
        assert_relative_eq!(growth, previous * (1.0 + r), epsilon = 1e-12);
        previous = growth;
    }

    let metrics = pipeline.risk_metrics().unwrap();
    let summary = metrics.summary(DEFAULT_CONFIDENCE).unwrap();
    assert_eq!(summary.observations, DAYS - 1);
    assert!(summary.volatility > 0.0);
    assert!(summary.value_at_risk < 0.0);
    assert!(summary.max_drawdown <= 0.0 && summary.max_drawdown >= -1.0);
    assert!(summary.beta.is_some());
    assert!(summary.tracking_error.unwrap() > 0.0);
}

#[tokio::test]
async fn test_marginal_var_round_trip() {
    let mut pipeline = ReturnPipeline::new(config()).unwrap();
    pipeline.fetch(&source()).await.unwrap();

    let assets = pipeline.resolved_returns().unwrap();
    let metrics = pipeline.risk_metrics().unwrap();
    let mvar = metrics.marginal_var(&assets).unwrap();

    let symbols: Vec<_> = mvar.iter().map(|m| m.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["AAPL", "MSFT", "GOOGL"]);

    let weighted: f64 = mvar
        .iter()
        .zip(pipeline.weights())
        .map(|(m, w)| m.marginal_var * w)
        .sum();
    let var = metrics.value_at_risk(DEFAULT_CONFIDENCE).unwrap();
    assert_relative_eq!(weighted, var, epsilon = 1e-10);
}

#[tokio::test]
async fn test_marginal_var_rejects_shorter_table() {
    let mut pipeline = ReturnPipeline::new(config()).unwrap();
    pipeline.fetch(&source()).await.unwrap();
    let metrics = pipeline.risk_metrics().unwrap();

    let mut short = InMemoryPriceSource::new();
    short.insert(path("AAPL", 0.0, 0.001).between(start(), start() + Duration::days(10)));
    let mut short_pipeline = ReturnPipeline::new(
        PortfolioConfig::new(vec!["AAPL".into()], start(), start() + Duration::days(10)),
    )
    .unwrap();
    short_pipeline.fetch(&short).await.unwrap();
    let assets = short_pipeline.resolved_returns().unwrap();

    assert!(matches!(
        metrics.marginal_var(&assets),
        Err(MetricsError::LengthMismatch { .. })
    ));
}

#[tokio::test]
async fn test_unresolved_ticker_fails_loudly() {
    let config = PortfolioConfig::new(
        vec!["AAPL".into(), "DELISTED".into(), "MSFT".into()],
        start(),
        start() + Duration::days(DAYS as i64),
    )
    .with_weights(vec![0.4, 0.3, 0.3]);

    let mut pipeline = ReturnPipeline::new(config).unwrap();
    pipeline.fetch(&source()).await.unwrap();

    assert!(matches!(
        pipeline.portfolio_returns(),
        Err(PipelineError::WeightCountMismatch {
            resolved: 2,
            weights: 3
        })
    ));
    assert!(pipeline.risk_metrics().is_err());
}

#[tokio::test]
async fn test_benchmark_less_portfolio() {
    let config = PortfolioConfig::new(
        vec!["AAPL".into(), "MSFT".into()],
        start(),
        start() + Duration::days(DAYS as i64),
    );
    let mut pipeline = ReturnPipeline::new(config).unwrap();
    pipeline.fetch(&source()).await.unwrap();

    let metrics = pipeline.risk_metrics().unwrap();
    assert!(matches!(
        metrics.beta(),
        Err(MetricsError::BenchmarkRequired { .. })
    ));
    assert!(matches!(
        metrics.tracking_error(),
        Err(MetricsError::BenchmarkRequired { .. })
    ));

    let summary = metrics.summary(0.95).unwrap();
    assert!(summary.beta.is_none());
}
