//! Portfolio configuration from a JSON file and command-line flags.

use chrono::{NaiveDate, Utc};
use clap::Args;
use meridian_risk::PortfolioConfig;
use std::path::{Path, PathBuf};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    /// Config file could not be read.
    #[error("Cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Config file is not a valid portfolio definition.
    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),
    /// Required setting given neither on the command line nor in the file.
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

/// Portfolio definition flags. Any flag given overrides the same field in
/// `--config`.
#[derive(Debug, Default, Clone, Args)]
pub(crate) struct PortfolioArgs {
    /// Comma-separated tickers, e.g. AAPL,MSFT,GOOGL
    #[arg(long, value_delimiter = ',')]
    pub(crate) tickers: Vec<String>,

    /// Comma-separated weights in ticker order (default: equal weights)
    #[arg(long, value_delimiter = ',')]
    pub(crate) weights: Option<Vec<f64>>,

    /// First date of the analysis window (YYYY-MM-DD)
    #[arg(long)]
    pub(crate) start: Option<NaiveDate>,

    /// Last date of the analysis window (YYYY-MM-DD, default: today)
    #[arg(long)]
    pub(crate) end: Option<NaiveDate>,

    /// Benchmark ticker for beta and tracking error, e.g. ^GSPC
    #[arg(long)]
    pub(crate) benchmark: Option<String>,

    /// Annual risk-free rate (default: 0.02)
    #[arg(long)]
    pub(crate) risk_free_rate: Option<f64>,

    /// JSON portfolio definition
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
}

impl PortfolioArgs {
    /// Merge the config file (if any) with the flags.
    pub(crate) fn resolve(&self) -> Result<PortfolioConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => PortfolioConfig::new(
                Vec::new(),
                self.start.ok_or(ConfigError::Missing("--start"))?,
                self.end.unwrap_or_else(|| Utc::now().date_naive()),
            ),
        };

        if !self.tickers.is_empty() {
            config.tickers = self.tickers.clone();
        }
        if let Some(start) = self.start {
            config.start = start;
        }
        if let Some(end) = self.end {
            config.end = end;
        }
        if let Some(weights) = &self.weights {
            config.weights = Some(weights.clone());
        }
        if let Some(benchmark) = &self.benchmark {
            config.benchmark = Some(benchmark.clone());
        }
        if let Some(rate) = self.risk_free_rate {
            config.risk_free_rate = rate;
        }

        if config.tickers.is_empty() {
            return Err(ConfigError::Missing("--tickers"));
        }

        config.tickers = config
            .tickers
            .iter()
            .map(|t| t.trim().to_uppercase())
            .collect();
        config.benchmark = config.benchmark.map(|b| b.trim().to_uppercase());

        Ok(config)
    }
}

/// Read a [`PortfolioConfig`] from a JSON file.
pub(crate) fn load_config(path: &Path) -> Result<PortfolioConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn config_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_flags_only() {
        let args = PortfolioArgs {
            tickers: vec!["aapl".into(), " msft".into()],
            start: Some(date("2023-01-01")),
            end: Some(date("2024-01-01")),
            benchmark: Some("^gspc".into()),
            ..Default::default()
        };

        let config = args.resolve().unwrap();
        assert_eq!(config.tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(config.benchmark.as_deref(), Some("^GSPC"));
        assert_eq!(config.weights, None);
        assert_eq!(config.risk_free_rate, 0.02);
    }

    #[test]
    fn test_end_defaults_to_today() {
        let args = PortfolioArgs {
            tickers: vec!["AAPL".into()],
            start: Some(date("2023-01-01")),
            ..Default::default()
        };
        assert_eq!(args.resolve().unwrap().end, Utc::now().date_naive());
    }

    #[test]
    fn test_flags_override_file() {
        let file = config_file(
            r#"{
                "tickers": ["AAPL", "MSFT"],
                "start": "2023-01-01",
                "end": "2024-01-01",
                "weights": [0.6, 0.4],
                "benchmark": "SPY"
            }"#,
        );
        let args = PortfolioArgs {
            config: Some(file.path().to_path_buf()),
            risk_free_rate: Some(0.05),
            end: Some(date("2023-06-30")),
            ..Default::default()
        };

        let config = args.resolve().unwrap();
        assert_eq!(config.tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(config.weights, Some(vec![0.6, 0.4]));
        assert_eq!(config.end, date("2023-06-30"));
        assert_eq!(config.risk_free_rate, 0.05);
        assert_eq!(config.benchmark.as_deref(), Some("SPY"));
    }

    #[rstest]
    #[case(PortfolioArgs { tickers: vec!["AAPL".into()], ..Default::default() }, "--start")]
    #[case(PortfolioArgs { start: Some(date("2023-01-01")), ..Default::default() }, "--tickers")]
    fn test_missing_settings(#[case] args: PortfolioArgs, #[case] flag: &str) {
        match args.resolve() {
            Err(ConfigError::Missing(missing)) => assert_eq!(missing, flag),
            other => panic!("expected missing {}, got {:?}", flag, other),
        }
    }

    #[test]
    fn test_bad_config_file() {
        let file = config_file("{ not json");
        let args = PortfolioArgs {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(matches!(args.resolve(), Err(ConfigError::Json(_))));

        let args = PortfolioArgs {
            config: Some(PathBuf::from("/nonexistent/portfolio.json")),
            ..Default::default()
        };
        assert!(matches!(args.resolve(), Err(ConfigError::Io { .. })));
    }
}
