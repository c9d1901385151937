#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/meridian/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod csv_file;
pub mod error;
pub mod prices;
pub mod source;
pub mod yahoo;

pub use cache::{CachedPriceSource, SqliteCache};
pub use csv_file::CsvPriceSource;
pub use error::{DataError, Result};
pub use prices::{PriceSeries, PriceTable};
pub use source::{InMemoryPriceSource, PriceSource};
pub use yahoo::YahooQuoteProvider;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
