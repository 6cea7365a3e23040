use std::collections::{BTreeMap, VecDeque};

use chrono::NaiveDate;
use thiserror::Error;

use crate::logging::log_event;
use crate::period::Period;
use crate::record::{DerivedRecord, TaggedRecord};

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("series {index}/{period} has a repeated or out-of-order date {date}")]
    NonIncreasingDates {
        index: String,
        period: Period,
        date: NaiveDate,
    },
    #[error("rolling window must cover at least 2 rows, got {0}")]
    InvalidWindow(usize),
}

pub type MetricsResult<T> = Result<T, MetricsError>;

/// Key of a series group: (index display name, period).
pub type GroupKey = (String, Period);

/// Partition tagged records by (index, period), each group sorted by ascending date.
pub fn group_records(records: Vec<TaggedRecord>) -> BTreeMap<GroupKey, Vec<TaggedRecord>> {
    let mut groups: BTreeMap<GroupKey, Vec<TaggedRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.raw.index_name.clone(), record.period))
            .or_default()
            .push(record);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|record| record.raw.date);
    }
    groups
}

/// Running state carried across one group's rows and dropped afterwards.
struct GroupState {
    prev_close: Option<f64>,
    running_max: f64,
    returns: VecDeque<Option<f64>>,
    window: usize,
}

impl GroupState {
    fn new(window: usize) -> Self {
        Self {
            prev_close: None,
            running_max: f64::NEG_INFINITY,
            returns: VecDeque::with_capacity(window),
            window,
        }
    }

    fn push_return(&mut self, value: Option<f64>) -> Option<f64> {
        self.returns.push_back(value);
        if self.returns.len() > self.window {
            self.returns.pop_front();
        }
        let available: Vec<f64> = self.returns.iter().flatten().copied().collect();
        sample_std(&available)
    }
}

/// Compute the sequential metrics of one series group.
///
/// `group` must be sorted by strictly increasing date. Ratio and event columns are left
/// empty for the later stages.
pub fn compute_group(group: &[TaggedRecord], window: usize) -> MetricsResult<Vec<DerivedRecord>> {
    if window < 2 {
        return Err(MetricsError::InvalidWindow(window));
    }
    if let Some(pair) = group.windows(2).find(|pair| pair[0].raw.date >= pair[1].raw.date) {
        return Err(MetricsError::NonIncreasingDates {
            index: pair[1].raw.index_name.clone(),
            period: pair[1].period,
            date: pair[1].raw.date,
        });
    }

    let derived = group
        .iter()
        .enumerate()
        .scan(GroupState::new(window), |state, (position, record)| {
            let close = record.raw.close;
            let (daily_return, log_return) = match state.prev_close {
                Some(prev) => (Some(close / prev - 1.0), Some(close.ln() - prev.ln())),
                None => (None, None),
            };
            state.prev_close = Some(close);
            state.running_max = state.running_max.max(close);
            let rolling_vol = state.push_return(daily_return);

            Some(DerivedRecord {
                raw: record.raw.clone(),
                period: record.period,
                trading_day_id: position as u32 + 1,
                daily_return,
                log_return,
                max_to_date: state.running_max,
                drawdown: close / state.running_max - 1.0,
                rolling_vol_30d: rolling_vol,
                nasdaq_sp500_ratio: None,
                event_flag: false,
                event_name: None,
            })
        })
        .collect();

    Ok(derived)
}

/// Run [`compute_group`] over every group, concatenated in group-key order.
pub fn compute_all(
    groups: &BTreeMap<GroupKey, Vec<TaggedRecord>>,
    window: usize,
) -> MetricsResult<Vec<DerivedRecord>> {
    let mut derived = Vec::with_capacity(groups.values().map(Vec::len).sum());
    for ((index, period), group) in groups {
        let rows = compute_group(group, window).inspect_err(|error| {
            log_event(
                file!(),
                "MetricsEngine",
                "compute_all",
                "metrics.group",
                line!(),
                &format!("Rejected series group {index}/{period}"),
                Some(&error.to_string()),
            );
        })?;
        derived.extend(rows);
    }

    log_event(
        file!(),
        "MetricsEngine",
        "compute_all",
        "metrics.group",
        line!(),
        &format!(
            "Computed {window}-row metrics for {} groups ({} rows)",
            groups.len(),
            derived.len()
        ),
        None,
    );

    Ok(derived)
}

/// Sample standard deviation; `None` with fewer than two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some(sample_variance(values, mean).sqrt())
}

fn sample_variance(values: &[f64], mean: f64) -> f64 {
    let sum_squares = values
        .iter()
        .map(|value| {
            let diff = value - mean;
            diff * diff
        })
        .sum::<f64>();
    sum_squares / (values.len() as f64 - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawRecord;

    fn tagged(day: u32, close: f64) -> TaggedRecord {
        TaggedRecord {
            raw: RawRecord {
                index_name: "NASDAQ".into(),
                date: NaiveDate::from_ymd_opt(2021, 1, day).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                adj_close: close,
                volume: 0,
            },
            period: Period::Ia,
        }
    }

    #[test]
    fn sample_std_matches_hand_computation() {
        assert_eq!(sample_std(&[]), None);
        assert_eq!(sample_std(&[0.3]), None);
        let std = sample_std(&[0.1, -0.1]).unwrap();
        assert!((std - 0.1414213562373095).abs() < 1e-12);
    }

    #[test]
    fn repeated_dates_are_rejected() {
        let group = vec![tagged(4, 100.0), tagged(4, 101.0)];
        assert!(matches!(
            compute_group(&group, 30),
            Err(MetricsError::NonIncreasingDates { .. })
        ));
    }

    #[test]
    fn window_drops_oldest_return() {
        let group = vec![tagged(4, 100.0), tagged(5, 110.0), tagged(6, 99.0), tagged(7, 99.0)];
        let rows = compute_group(&group, 2).unwrap();
        // Window of 2 at the last row holds the returns of rows 2 and 3 only.
        let expected = sample_std(&[-0.1, 0.0]).unwrap();
        assert!((rows[3].rolling_vol_30d.unwrap() - expected).abs() < 1e-12);
        // Row 1's window holds [null, 0.1]: a single sample.
        assert_eq!(rows[1].rolling_vol_30d, None);
    }
}
