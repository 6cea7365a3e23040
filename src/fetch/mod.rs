//! Daily price history sources.
//!
//! The pipeline only sees the [`SeriesFetcher`] trait. Retry policy, if any, belongs to
//! the implementation; every error returned here aborts the run.

mod csv;
mod yahoo;

use std::collections::HashMap;

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use thiserror::Error;

use crate::record::RawBar;

pub use self::csv::CsvFetcher;
pub use self::yahoo::YahooFetcher;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error while fetching {symbol}: {message}")]
    Network { symbol: String, message: String },
    #[error("HTTP {status} while fetching {symbol}")]
    Status { symbol: String, status: u16 },
    #[error("unexpected response for {symbol}: {message}")]
    ResponseFormat { symbol: String, message: String },
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),
    #[error("no bars for {symbol} between {start} and {end}")]
    EmptySeries {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("failed to read price file {path}: {source}")]
    Source { path: String, source: PolarsError },
    #[error("price file {path}: {message}")]
    InvalidRow { path: String, message: String },
}

pub type FetchResult<T> = Result<T, FetchError>;

pub trait SeriesFetcher: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch daily bars for `symbol` within `[start, end]`, ascending by date.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> FetchResult<Vec<RawBar>>;
}

/// In-memory fetcher over preloaded bars.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    series: HashMap<String, Vec<RawBar>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: impl Into<String>, bars: Vec<RawBar>) -> Self {
        self.series.insert(symbol.into(), bars);
        self
    }
}

impl SeriesFetcher for StaticFetcher {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> FetchResult<Vec<RawBar>> {
        let bars = self
            .series
            .get(symbol)
            .ok_or_else(|| FetchError::SymbolNotFound(symbol.to_string()))?;
        let mut in_range: Vec<RawBar> = bars
            .iter()
            .filter(|bar| start <= bar.date && bar.date <= end)
            .cloned()
            .collect();
        if in_range.is_empty() {
            return Err(FetchError::EmptySeries {
                symbol: symbol.to_string(),
                start,
                end,
            });
        }
        in_range.sort_by_key(|bar| bar.date);
        Ok(in_range)
    }
}
