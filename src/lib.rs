//! bubblescope derives a tidy comparison dataset for the Nasdaq Composite and the
//! S&P 500 across the dot-com bubble and the AI-era market narrative.
//!
//! Raw daily bars are tagged with a historical period, turned into per-group return,
//! drawdown and rolling-volatility series, joined with the cross-index close ratio and an
//! optional event table, and assembled into one ordered table.

pub mod config;
pub mod dataset;
pub mod events;
pub mod fetch;
pub mod logging;
pub mod metrics;
pub mod period;
pub mod pipeline;
pub mod ratio;
pub mod record;
pub mod views;

pub use config::{ConfigError, IndexSpec, PipelineConfig};
pub use dataset::{Dataset, DatasetError};
pub use events::{EventEntry, EventSource, EventTable, EventTableError};
pub use fetch::{CsvFetcher, FetchError, SeriesFetcher, StaticFetcher, YahooFetcher};
pub use metrics::{MetricsError, compute_group, group_records};
pub use period::{Period, PeriodRule, classify};
pub use pipeline::{Pipeline, PipelineError};
pub use ratio::RatioTable;
pub use record::{DerivedRecord, RawBar, RawRecord, TaggedRecord};

pub type Result<T> = anyhow::Result<T>;
