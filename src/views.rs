//! Chart-ready views over a finished dataset.

use chrono::NaiveDate;

use crate::dataset::Dataset;
use crate::events::EventTable;
use crate::period::{Period, PeriodRule, classify};
use crate::record::DerivedRecord;

/// Close rebased to 100 at the first row of its (index, period) group, aligned with
/// `dataset.rows()`.
pub fn indexed_to_100(dataset: &Dataset) -> Vec<Option<f64>> {
    let mut base: Option<(&str, Period, f64)> = None;
    dataset
        .rows()
        .iter()
        .map(|row| {
            let current = match base {
                Some((index, period, close)) if index == row.index_name() && period == row.period => close,
                _ => {
                    base = Some((row.index_name(), row.period, row.close()));
                    row.close()
                }
            };
            (current != 0.0).then(|| row.close() / current * 100.0)
        })
        .collect()
}

pub fn drawdown_pct(row: &DerivedRecord) -> f64 {
    row.drawdown * 100.0
}

/// An event pinned to the last trading day of an index on or before its date.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedEvent {
    pub date: NaiveDate,
    pub event_name: String,
    pub description: Option<String>,
    pub trading_date: NaiveDate,
    pub close: f64,
    pub period: Period,
}

/// As-of backward join of events onto one index's series.
///
/// Events outside every rule are dropped, as are events preceding the index's first
/// trading day. The period comes from the event date, not the matched row.
pub fn align_events(
    table: &EventTable,
    dataset: &Dataset,
    index_name: &str,
    rules: &[PeriodRule],
) -> Vec<AlignedEvent> {
    let mut series: Vec<&DerivedRecord> = dataset
        .rows()
        .iter()
        .filter(|row| row.index_name() == index_name)
        .collect();
    series.sort_by_key(|row| row.date());

    let mut events: Vec<_> = table.entries().iter().collect();
    events.sort_by_key(|entry| entry.date);

    events
        .into_iter()
        .filter_map(|entry| {
            let period = classify(entry.date, rules)?;
            let matched = series.partition_point(|row| row.date() <= entry.date);
            let row = series.get(matched.checked_sub(1)?)?;
            Some(AlignedEvent {
                date: entry.date,
                event_name: entry.event_name.clone(),
                description: entry.description().map(str::to_string),
                trading_date: row.date(),
                close: row.close(),
                period,
            })
        })
        .collect()
}
