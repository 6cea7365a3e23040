use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use proptest::prelude::*;

use bubblescope::{EventSource, Pipeline, PipelineConfig, RawRecord};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()
}

fn record(index: &str, offset: usize, close: f64) -> RawRecord {
    RawRecord {
        index_name: index.to_string(),
        date: start() + Days::new(offset as u64),
        open: close,
        high: close,
        low: close,
        close,
        adj_close: close,
        volume: 0,
    }
}

/// NASDAQ closes on consecutive days plus an SP500 series that skips some of them.
fn two_index_records() -> impl Strategy<Value = Vec<RawRecord>> {
    (
        prop::collection::vec(1.0f64..5_000.0, 1..80),
        prop::collection::vec(prop::option::of(1.0f64..5_000.0), 1..80),
    )
        .prop_map(|(nasdaq, sp500)| {
            let mut records: Vec<RawRecord> = nasdaq
                .into_iter()
                .enumerate()
                .map(|(offset, close)| record("NASDAQ", offset, close))
                .collect();
            records.extend(
                sp500
                    .into_iter()
                    .enumerate()
                    .filter_map(|(offset, close)| close.map(|c| record("SP500", offset, c))),
            );
            records
        })
}

proptest! {
    #[test]
    fn derived_metrics_hold_their_invariants(records in two_index_records()) {
        let closes: HashMap<(String, NaiveDate), f64> = records
            .iter()
            .map(|r| ((r.index_name.clone(), r.date), r.close))
            .collect();
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let dataset = pipeline.build(records, &EventSource::NoEvents).unwrap();

        let groups = dataset
            .rows()
            .chunk_by(|a, b| a.index_name() == b.index_name() && a.period == b.period);
        for group in groups {
            for (position, row) in group.iter().enumerate() {
                prop_assert_eq!(row.trading_day_id as usize, position + 1);
                prop_assert!(row.drawdown <= 0.0);
                if row.close() == row.max_to_date {
                    prop_assert_eq!(row.drawdown, 0.0);
                }
                if let (Some(simple), Some(log)) = (row.daily_return, row.log_return) {
                    prop_assert!((log - (1.0 + simple).ln()).abs() < 1e-9);
                }
                // Consecutive rows: the trailing window holds `position` returns until it fills.
                prop_assert_eq!(row.rolling_vol_30d.is_none(), position < 2);
            }
            for pair in group.windows(2) {
                prop_assert!(pair[0].max_to_date <= pair[1].max_to_date);
            }
        }

        let mut ratio_by_date: HashMap<NaiveDate, Option<f64>> = HashMap::new();
        for row in dataset.rows() {
            let seen = *ratio_by_date.entry(row.date()).or_insert(row.nasdaq_sp500_ratio);
            prop_assert_eq!(seen, row.nasdaq_sp500_ratio);

            let expected = match (
                closes.get(&("NASDAQ".to_string(), row.date())),
                closes.get(&("SP500".to_string(), row.date())),
            ) {
                (Some(n), Some(s)) => Some(n / s),
                _ => None,
            };
            prop_assert_eq!(row.nasdaq_sp500_ratio, expected);
            prop_assert!(!row.event_flag && row.event_name.is_none());
        }
    }
}
