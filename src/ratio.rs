use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::logging::log_event;
use crate::record::{DerivedRecord, RawRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ClosePair {
    numerator: Option<f64>,
    denominator: Option<f64>,
}

impl ClosePair {
    fn ratio(&self) -> Option<f64> {
        match (self.numerator, self.denominator) {
            (Some(num), Some(den)) if den != 0.0 => Some(num / den),
            _ => None,
        }
    }
}

/// Date-keyed ratio of two indices' closes.
///
/// Built in one pass over the raw records; the ratio belongs to the date and is
/// broadcast to every row carrying it, whatever the row's own index or period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatioTable {
    by_date: BTreeMap<NaiveDate, Option<f64>>,
}

impl RatioTable {
    pub fn build<'a, I>(records: I, numerator: &str, denominator: &str) -> Self
    where
        I: IntoIterator<Item = &'a RawRecord>,
    {
        let mut pairs: BTreeMap<NaiveDate, ClosePair> = BTreeMap::new();
        for record in records {
            let slot = if record.index_name == numerator {
                &mut pairs.entry(record.date).or_default().numerator
            } else if record.index_name == denominator {
                &mut pairs.entry(record.date).or_default().denominator
            } else {
                continue;
            };
            // Dates are unique per index; keep the first close if that ever breaks.
            slot.get_or_insert(record.close);
        }

        let by_date: BTreeMap<NaiveDate, Option<f64>> = pairs
            .into_iter()
            .map(|(date, pair)| (date, pair.ratio()))
            .collect();

        let paired = by_date.values().filter(|ratio| ratio.is_some()).count();
        log_event(
            file!(),
            "RatioCalculator",
            "build",
            "ratio.build",
            line!(),
            &format!(
                "Built {numerator}/{denominator} ratio for {paired} dates, {} dates unpaired",
                by_date.len() - paired
            ),
            None,
        );

        Self { by_date }
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.by_date.get(&date).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    /// Write the ratio of each row's date into `nasdaq_sp500_ratio`.
    pub fn apply(&self, rows: &mut [DerivedRecord]) {
        for row in rows.iter_mut() {
            row.nasdaq_sp500_ratio = self.get(row.date());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(index: &str, day: u32, close: f64) -> RawRecord {
        RawRecord {
            index_name: index.into(),
            date: NaiveDate::from_ymd_opt(2021, 1, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            adj_close: close,
            volume: 1,
        }
    }

    #[test]
    fn unpaired_and_zero_denominator_dates_have_no_ratio() {
        let records = vec![
            raw("NASDAQ", 4, 50.0),
            raw("SP500", 4, 100.0),
            raw("NASDAQ", 5, 51.0),
            raw("NASDAQ", 6, 52.0),
            raw("SP500", 6, 0.0),
            raw("DOW", 4, 300.0),
        ];
        let table = RatioTable::build(&records, "NASDAQ", "SP500");
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(records[0].date), Some(0.5));
        assert_eq!(table.get(records[2].date), None);
        assert_eq!(table.get(records[3].date), None);
    }
}
