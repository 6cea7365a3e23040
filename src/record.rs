//! Row types flowing through the pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::period::Period;

/// Daily OHLCV bar as returned by a [`SeriesFetcher`](crate::fetch::SeriesFetcher).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
}

/// A fetched bar attributed to an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub index_name: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
}

impl RawRecord {
    pub fn from_bar(index_name: &str, bar: RawBar) -> Self {
        Self {
            index_name: index_name.to_string(),
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            adj_close: bar.adj_close,
            volume: bar.volume,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaggedRecord {
    pub raw: RawRecord,
    pub period: Period,
}

/// A raw record with every derived column of the output table.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRecord {
    pub raw: RawRecord,
    pub period: Period,
    pub trading_day_id: u32,
    pub daily_return: Option<f64>,
    pub log_return: Option<f64>,
    pub max_to_date: f64,
    pub drawdown: f64,
    pub rolling_vol_30d: Option<f64>,
    pub nasdaq_sp500_ratio: Option<f64>,
    pub event_flag: bool,
    pub event_name: Option<String>,
}

impl DerivedRecord {
    pub fn date(&self) -> NaiveDate {
        self.raw.date
    }

    pub fn index_name(&self) -> &str {
        &self.raw.index_name
    }

    pub fn close(&self) -> f64 {
        self.raw.close
    }
}
