use std::fs::{self, File};
use std::path::Path;

use polars::prelude::*;
use thiserror::Error;

use crate::logging::log_event;
use crate::record::DerivedRecord;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to build dataset frame: {source}")]
    Frame { source: PolarsError },
    #[error("failed to write dataset to {path}: {source}")]
    Write { path: String, source: PolarsError },
    #[error("failed to prepare output {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

pub type DatasetResult<T> = Result<T, DatasetError>;

/// Final tidy table, one row per (index, period, date).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    rows: Vec<DerivedRecord>,
}

impl Dataset {
    pub const COLUMNS: [&'static str; 18] = [
        "date",
        "index",
        "period",
        "trading_day_id",
        "open",
        "high",
        "low",
        "close",
        "adj_close",
        "volume",
        "daily_return",
        "log_return",
        "rolling_vol_30d",
        "max_to_date",
        "drawdown",
        "nasdaq_sp500_ratio",
        "event_flag",
        "event_name",
    ];

    /// Order rows by (index, period, date). No values are recomputed.
    pub fn assemble(mut rows: Vec<DerivedRecord>) -> Self {
        rows.sort_by(|a, b| {
            a.index_name()
                .cmp(b.index_name())
                .then(a.period.cmp(&b.period))
                .then(a.date().cmp(&b.date()))
        });

        log_event(
            file!(),
            "DatasetAssembler",
            "assemble",
            "dataset.assemble",
            line!(),
            &format!("Assembled dataset with {} rows", rows.len()),
            None,
        );

        Self { rows }
    }

    pub fn rows(&self) -> &[DerivedRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<DerivedRecord> {
        self.rows
    }

    pub fn to_frame(&self) -> DatasetResult<DataFrame> {
        let rows = &self.rows;
        let floats = |f: fn(&DerivedRecord) -> f64| rows.iter().map(f).collect::<Vec<f64>>();
        let optional = |f: fn(&DerivedRecord) -> Option<f64>| {
            rows.iter().map(f).collect::<Vec<Option<f64>>>()
        };

        let columns = vec![
            Series::new(
                Self::COLUMNS[0],
                rows.iter()
                    .map(|r| r.date().format("%Y-%m-%d").to_string())
                    .collect::<Vec<String>>(),
            ),
            Series::new(
                Self::COLUMNS[1],
                rows.iter().map(|r| r.index_name()).collect::<Vec<&str>>(),
            ),
            Series::new(
                Self::COLUMNS[2],
                rows.iter().map(|r| r.period.as_str()).collect::<Vec<&str>>(),
            ),
            Series::new(
                Self::COLUMNS[3],
                rows.iter().map(|r| r.trading_day_id).collect::<Vec<u32>>(),
            ),
            Series::new(Self::COLUMNS[4], floats(|r| r.raw.open)),
            Series::new(Self::COLUMNS[5], floats(|r| r.raw.high)),
            Series::new(Self::COLUMNS[6], floats(|r| r.raw.low)),
            Series::new(Self::COLUMNS[7], floats(|r| r.raw.close)),
            Series::new(Self::COLUMNS[8], floats(|r| r.raw.adj_close)),
            Series::new(
                Self::COLUMNS[9],
                rows.iter().map(|r| r.raw.volume).collect::<Vec<u64>>(),
            ),
            Series::new(Self::COLUMNS[10], optional(|r| r.daily_return)),
            Series::new(Self::COLUMNS[11], optional(|r| r.log_return)),
            Series::new(Self::COLUMNS[12], optional(|r| r.rolling_vol_30d)),
            Series::new(Self::COLUMNS[13], floats(|r| r.max_to_date)),
            Series::new(Self::COLUMNS[14], floats(|r| r.drawdown)),
            Series::new(Self::COLUMNS[15], optional(|r| r.nasdaq_sp500_ratio)),
            Series::new(
                Self::COLUMNS[16],
                rows.iter().map(|r| r.event_flag).collect::<Vec<bool>>(),
            ),
            Series::new(
                Self::COLUMNS[17],
                rows.iter()
                    .map(|r| r.event_name.as_deref())
                    .collect::<Vec<Option<&str>>>(),
            ),
        ];

        DataFrame::new(columns).map_err(|source| DatasetError::Frame { source })
    }

    /// Write the dataset as CSV with a header row, creating parent directories.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> DatasetResult<()> {
        let path_ref = path.as_ref();
        let display = path_ref.display().to_string();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| DatasetError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let mut frame = self.to_frame()?;
        let mut file = File::create(path_ref).map_err(|source| DatasetError::Io {
            path: display.clone(),
            source,
        })?;

        CsvWriter::new(&mut file)
            .has_header(true)
            .finish(&mut frame)
            .map_err(|source| {
                log_event(
                    file!(),
                    "Dataset",
                    "write_csv",
                    "dataset.write",
                    line!(),
                    &format!("Failed to write {display}"),
                    Some(&source.to_string()),
                );
                DatasetError::Write {
                    path: display.clone(),
                    source,
                }
            })?;

        log_event(
            file!(),
            "Dataset",
            "write_csv",
            "dataset.write",
            line!(),
            &format!("Wrote {} rows to {display}", self.rows.len()),
            None,
        );

        Ok(())
    }
}
