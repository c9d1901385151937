//! Meridian CLI binary.
//!
//! Provides command-line interface for portfolio risk metrics.

mod cache_manager;
mod config;
mod source;

use clap::{Parser, Subcommand, ValueEnum};
use config::PortfolioArgs;
use indicatif::{ProgressBar, ProgressStyle};
use meridian::analyze;
use meridian_output::{ExportFormat, Exporter};
use meridian_risk::DEFAULT_CONFIDENCE;
use source::{FetchConfig, Source};
use std::path::PathBuf;
use std::process;
use std::time::Duration as StdDuration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meridian")]
#[command(about = "Meridian: portfolio return and risk metrics", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute risk metrics for a portfolio
    Analyze {
        #[command(flatten)]
        portfolio: PortfolioArgs,

        /// VaR confidence level
        #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
        confidence: f64,

        /// Read prices from a CSV file instead of Yahoo Finance
        #[arg(long)]
        prices: Option<PathBuf>,

        /// Disable caching (always fetch fresh data)
        #[arg(long)]
        no_cache: bool,

        /// Force refresh cached data
        #[arg(long)]
        refresh: bool,

        /// Portfolio value, to also report VaR in currency units
        #[arg(long, value_parser = parse_portfolio_value)]
        portfolio_value: Option<f64>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write the daily series to a .csv or .json file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Show or clear the price cache
    Cache {
        /// Delete all cached prices
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn parse_portfolio_value(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        Ok(v) => Err(format!("portfolio value must be positive, got {}", v)),
        Err(e) => Err(e.to_string()),
    }
}

/// Install the log subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Analyze {
            portfolio,
            confidence,
            prices,
            no_cache,
            refresh,
            portfolio_value,
            format,
            export,
        } => {
            let fetch = FetchConfig {
                use_cache: !no_cache,
                force_refresh: refresh,
            };
            let output = OutputOptions {
                portfolio_value,
                format,
                export,
            };
            analyze_portfolio(&portfolio, confidence, prices, fetch, output).await?;
        }
        Commands::Cache { clear } => {
            if clear {
                cache_manager::clear_cache()?;
            } else {
                cache_manager::print_cache_info()?;
            }
        }
    }

    Ok(())
}

/// How `analyze` presents its results.
#[derive(Debug)]
struct OutputOptions {
    portfolio_value: Option<f64>,
    format: OutputFormat,
    export: Option<PathBuf>,
}

async fn analyze_portfolio(
    args: &PortfolioArgs,
    confidence: f64,
    prices: Option<PathBuf>,
    fetch: FetchConfig,
    output: OutputOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.resolve()?;
    let source = Source::select(prices.as_deref(), fetch)?;
    let name = config.tickers.join(", ");

    // Spinner for the network round trips (the slow step)
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(StdDuration::from_millis(100));
    pb.set_message(format!(
        "Fetching {} tickers from {}...",
        config.tickers.len(),
        source.describe()
    ));

    let mut analysis = match analyze(name, config, &source, confidence).await {
        Ok(a) => {
            pb.finish_and_clear();
            a
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            return Err(e.into());
        }
    };

    if let Some(value) = output.portfolio_value {
        analysis.summary.set_portfolio_value(value);
    }

    match output.format {
        OutputFormat::Text => println!("{}", analysis.summary.to_ascii_table()),
        OutputFormat::Markdown => println!("{}", analysis.summary.to_markdown()),
        OutputFormat::Json => println!("{}", analysis.report()?.to_json()?),
    }

    if let Some(path) = output.export {
        let format = ExportFormat::from_path(&path)?;
        analysis.series.export_to_file(&path, format)?;
        eprintln!("Series written to {}", path.display());
    }

    Ok(())
}
