use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;

use crate::logging::log_event;
use crate::record::DerivedRecord;

pub const DATE_COLUMN: &str = "date";
pub const EVENT_NAME_COLUMN: &str = "event_name";
pub const DESCRIPTION_COLUMN: &str = "description";

#[derive(Debug, Error)]
pub enum EventTableError {
    #[error("failed to read event table {path}: {source}")]
    Load { path: String, source: PolarsError },
    #[error("event table is missing required column `{0}`")]
    MissingColumn(String),
    #[error("event table column `{column}` could not be read as text: {source}")]
    Column { column: String, source: PolarsError },
    #[error("event table row {row}: unparsable date `{value}`")]
    InvalidDate { row: usize, value: String },
    #[error("event table row {row}: empty `{column}`")]
    MissingValue { row: usize, column: String },
}

pub type EventTableResult<T> = Result<T, EventTableError>;

/// One row of the event table. Columns other than `date` and `event_name` are kept
/// verbatim in `attributes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEntry {
    pub date: NaiveDate,
    pub event_name: String,
    pub attributes: BTreeMap<String, String>,
}

impl EventEntry {
    pub fn new(date: NaiveDate, event_name: impl Into<String>) -> Self {
        Self {
            date,
            event_name: event_name.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(column.into(), value.into());
        self
    }

    pub fn description(&self) -> Option<&str> {
        self.attributes.get(DESCRIPTION_COLUMN).map(String::as_str)
    }
}

/// Events keyed by date. When a date repeats, the first row in file order wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    entries: Vec<EventEntry>,
    by_date: HashMap<NaiveDate, usize>,
    duplicates_dropped: usize,
}

impl EventTable {
    pub fn from_entries(entries: impl IntoIterator<Item = EventEntry>) -> Self {
        let mut table = Self::default();
        for entry in entries {
            if table.by_date.contains_key(&entry.date) {
                table.duplicates_dropped += 1;
                continue;
            }
            table.by_date.insert(entry.date, table.entries.len());
            table.entries.push(entry);
        }
        table
    }

    pub fn from_csv<P: AsRef<Path>>(path: P) -> EventTableResult<Self> {
        let path_ref = path.as_ref();
        let frame = LazyCsvReader::new(path_ref)
            .has_header(true)
            .finish()
            .and_then(|lazy| lazy.collect())
            .map_err(|source| {
                log_event(
                    file!(),
                    "EventTable",
                    "from_csv",
                    "events.load",
                    line!(),
                    &format!("Failed to load {}", path_ref.display()),
                    Some(&source.to_string()),
                );
                EventTableError::Load {
                    path: path_ref.display().to_string(),
                    source,
                }
            })?;

        let table = Self::from_frame(&frame).inspect_err(|error| {
            log_event(
                file!(),
                "EventTable",
                "from_csv",
                "events.load",
                line!(),
                &format!("Rejected malformed event table {}", path_ref.display()),
                Some(&error.to_string()),
            );
        })?;

        log_event(
            file!(),
            "EventTable",
            "from_csv",
            "events.load",
            line!(),
            &format!(
                "Loaded {} events from {} ({} duplicate dates dropped)",
                table.len(),
                path_ref.display(),
                table.duplicates_dropped
            ),
            None,
        );

        Ok(table)
    }

    pub fn from_frame(frame: &DataFrame) -> EventTableResult<Self> {
        let dates = text_column(frame, DATE_COLUMN)?;
        let names = text_column(frame, EVENT_NAME_COLUMN)?;

        let extra_columns: Vec<(String, Vec<Option<String>>)> = frame
            .get_column_names()
            .into_iter()
            .filter(|name| *name != DATE_COLUMN && *name != EVENT_NAME_COLUMN)
            .map(|name| text_column(frame, name).map(|values| (name.to_string(), values)))
            .collect::<EventTableResult<_>>()?;

        let mut entries = Vec::with_capacity(dates.len());
        for (row, (date, name)) in dates.into_iter().zip(names).enumerate() {
            let date = parse_event_date(row, date)?;
            let event_name = name.ok_or_else(|| EventTableError::MissingValue {
                row,
                column: EVENT_NAME_COLUMN.to_string(),
            })?;

            let attributes = extra_columns
                .iter()
                .filter_map(|(column, values)| {
                    values[row]
                        .as_ref()
                        .map(|value| (column.clone(), value.clone()))
                })
                .collect();

            entries.push(EventEntry {
                date,
                event_name,
                attributes,
            });
        }

        Ok(Self::from_entries(entries))
    }

    pub fn get(&self, date: NaiveDate) -> Option<&EventEntry> {
        self.by_date.get(&date).map(|&idx| &self.entries[idx])
    }

    pub fn entries(&self) -> &[EventEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates_dropped
    }
}

fn text_column(frame: &DataFrame, name: &str) -> EventTableResult<Vec<Option<String>>> {
    let series = frame
        .column(name)
        .map_err(|_| EventTableError::MissingColumn(name.to_string()))?;
    let as_text = series
        .cast(&DataType::Utf8)
        .map_err(|source| EventTableError::Column {
            column: name.to_string(),
            source,
        })?;
    let chunked = as_text.utf8().map_err(|source| EventTableError::Column {
        column: name.to_string(),
        source,
    })?;
    Ok(chunked
        .into_iter()
        .map(|value| value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string))
        .collect())
}

fn parse_event_date(row: usize, value: Option<String>) -> EventTableResult<NaiveDate> {
    let value = value.ok_or_else(|| EventTableError::MissingValue {
        row,
        column: DATE_COLUMN.to_string(),
    })?;
    NaiveDate::parse_from_str(&value, "%Y-%m-%d")
        .map_err(|_| EventTableError::InvalidDate { row, value })
}

/// Whether the run joins an event table. Resolved once before the pipeline starts.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EventSource {
    #[default]
    NoEvents,
    Events(EventTable),
}

impl EventSource {
    /// `None` or a path that does not exist yields [`EventSource::NoEvents`]; an existing
    /// file must parse as an event table.
    pub fn load(path: Option<&Path>) -> EventTableResult<Self> {
        match path {
            Some(path) if path.exists() => EventTable::from_csv(path).map(EventSource::Events),
            Some(path) => {
                log_event(
                    file!(),
                    "EventSource",
                    "load",
                    "events.load",
                    line!(),
                    &format!("No event table at {}; continuing without events", path.display()),
                    None,
                );
                Ok(EventSource::NoEvents)
            }
            None => Ok(EventSource::NoEvents),
        }
    }

    pub fn table(&self) -> Option<&EventTable> {
        match self {
            EventSource::NoEvents => None,
            EventSource::Events(table) => Some(table),
        }
    }

    /// Left-join events onto rows by date. Every row is kept.
    pub fn enrich(&self, rows: &mut [DerivedRecord]) {
        let Some(table) = self.table() else {
            for row in rows.iter_mut() {
                row.event_flag = false;
                row.event_name = None;
            }
            return;
        };

        let mut matched = 0usize;
        for row in rows.iter_mut() {
            match table.get(row.date()) {
                Some(entry) => {
                    row.event_flag = true;
                    row.event_name = Some(entry.event_name.clone());
                    matched += 1;
                }
                None => {
                    row.event_flag = false;
                    row.event_name = None;
                }
            }
        }

        log_event(
            file!(),
            "EventEnricher",
            "enrich",
            "events.join",
            line!(),
            &format!("Flagged {matched} of {} rows with events", rows.len()),
            None,
        );
    }
}
