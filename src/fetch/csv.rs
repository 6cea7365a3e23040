//! Offline backend reading one CSV file per symbol.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;

use super::{FetchError, FetchResult, SeriesFetcher};
use crate::logging::log_event;
use crate::record::RawBar;

/// Reads `<dir>/<symbol>.csv` with columns `date,open,high,low,close,adj_close,volume`.
///
/// Characters outside `[A-Za-z0-9._-]` are dropped from the symbol to form the file
/// name, so `^IXIC` is read from `IXIC.csv`.
#[derive(Debug, Clone)]
pub struct CsvFetcher {
    dir: PathBuf,
}

impl CsvFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        let stem: String = symbol
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            .collect();
        self.dir.join(format!("{stem}.csv"))
    }

    fn load(path: &Path) -> FetchResult<DataFrame> {
        LazyCsvReader::new(path)
            .has_header(true)
            .with_infer_schema_length(Some(2048))
            .finish()
            .and_then(|lazy| lazy.collect())
            .map_err(|source| FetchError::Source {
                path: path.display().to_string(),
                source,
            })
    }
}

fn float_column(frame: &DataFrame, name: &str, path: &Path) -> FetchResult<Vec<Option<f64>>> {
    let source = |source| FetchError::Source {
        path: path.display().to_string(),
        source,
    };
    let series = frame.column(name).map_err(source)?;
    let floats = series.cast(&DataType::Float64).map_err(source)?;
    let chunked = floats.f64().map_err(source)?;
    Ok(chunked.into_iter().collect())
}

fn date_column(frame: &DataFrame, path: &Path) -> FetchResult<Vec<NaiveDate>> {
    let source = |source| FetchError::Source {
        path: path.display().to_string(),
        source,
    };
    let series = frame.column("date").map_err(source)?;
    let text = series.cast(&DataType::Utf8).map_err(source)?;
    let chunked = text.utf8().map_err(source)?;

    chunked
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            let value = value.unwrap_or_default().trim();
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| FetchError::InvalidRow {
                path: path.display().to_string(),
                message: format!("row {row}: unparsable date `{value}`"),
            })
        })
        .collect()
}

impl SeriesFetcher for CsvFetcher {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> FetchResult<Vec<RawBar>> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(FetchError::SymbolNotFound(symbol.to_string()));
        }

        let frame = Self::load(&path)?;
        let dates = date_column(&frame, &path)?;
        let open = float_column(&frame, "open", &path)?;
        let high = float_column(&frame, "high", &path)?;
        let low = float_column(&frame, "low", &path)?;
        let close = float_column(&frame, "close", &path)?;
        let adj_close = float_column(&frame, "adj_close", &path)?;
        let volume = float_column(&frame, "volume", &path)?;

        let mut bars: Vec<RawBar> = dates
            .iter()
            .enumerate()
            .filter(|(_, date)| start <= **date && **date <= end)
            .filter_map(|(i, &date)| {
                let close = close[i]?;
                Some(RawBar {
                    date,
                    open: open[i].unwrap_or(f64::NAN),
                    high: high[i].unwrap_or(f64::NAN),
                    low: low[i].unwrap_or(f64::NAN),
                    close,
                    adj_close: adj_close[i].unwrap_or(close),
                    volume: volume[i].map_or(0, |v| v.max(0.0) as u64),
                })
            })
            .collect();

        if bars.is_empty() {
            return Err(FetchError::EmptySeries {
                symbol: symbol.to_string(),
                start,
                end,
            });
        }
        bars.sort_by_key(|bar| bar.date);

        log_event(
            file!(),
            "CsvFetcher",
            "fetch",
            "fetch.csv",
            line!(),
            &format!("Loaded {} bars for {symbol} from {}", bars.len(), path.display()),
            None,
        );

        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_is_sanitized_into_file_name() {
        let fetcher = CsvFetcher::new("data_raw");
        assert_eq!(fetcher.path_for("^IXIC"), PathBuf::from("data_raw/IXIC.csv"));
        assert_eq!(fetcher.path_for("BRK.B"), PathBuf::from("data_raw/BRK.B.csv"));
    }
}
