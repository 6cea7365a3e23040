use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::log_event;
use crate::record::{RawRecord, TaggedRecord};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown period tag: {0}")]
pub struct UnknownPeriod(pub String);

/// Historical window a trading day belongs to.
///
/// Ordering follows the serialized tag, so sorting by period matches sorting by
/// the `period` column of the output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Dotcom,
    Ia,
}

impl Period {
    pub const ALL: [Period; 2] = [Period::Dotcom, Period::Ia];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Dotcom => "dotcom",
            Period::Ia => "ia",
        }
    }

    /// Human-readable label used by charts and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Period::Dotcom => "Dot-com bubble (1997-2002)",
            Period::Ia => "AI narrative (2020-2025)",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = UnknownPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dotcom" => Ok(Period::Dotcom),
            "ia" => Ok(Period::Ia),
            other => Err(UnknownPeriod(other.to_string())),
        }
    }
}

/// Inclusive date range mapped to a period tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRule {
    pub period: Period,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodRule {
    pub fn new(period: Period, start: NaiveDate, end: NaiveDate) -> Self {
        Self { period, start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, other: &PeriodRule) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Tag a date with the first rule containing it. `None` means the date is excluded.
pub fn classify(date: NaiveDate, rules: &[PeriodRule]) -> Option<Period> {
    rules
        .iter()
        .find(|rule| rule.contains(date))
        .map(|rule| rule.period)
}

/// Tag every record and drop those outside all rules.
pub fn classify_records(records: Vec<RawRecord>, rules: &[PeriodRule]) -> Vec<TaggedRecord> {
    let total = records.len();
    let tagged: Vec<TaggedRecord> = records
        .into_iter()
        .filter_map(|raw| classify(raw.date, rules).map(|period| TaggedRecord { raw, period }))
        .collect();

    log_event(
        file!(),
        "PeriodClassifier",
        "classify_records",
        "period.classify",
        line!(),
        &format!(
            "Tagged {} of {total} records, dropped {} outside configured periods",
            tagged.len(),
            total - tagged.len()
        ),
        None,
    );

    tagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_period_rules;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn boundaries_are_inclusive() {
        let rules = default_period_rules();
        assert_eq!(classify(date(1997, 1, 1), &rules), Some(Period::Dotcom));
        assert_eq!(classify(date(2002, 12, 31), &rules), Some(Period::Dotcom));
        assert_eq!(classify(date(2020, 1, 1), &rules), Some(Period::Ia));
        assert_eq!(classify(date(2025, 12, 31), &rules), Some(Period::Ia));
    }

    #[test]
    fn dates_between_periods_are_excluded() {
        let rules = default_period_rules();
        assert_eq!(classify(date(1996, 12, 31), &rules), None);
        assert_eq!(classify(date(2003, 1, 2), &rules), None);
        assert_eq!(classify(date(2019, 12, 31), &rules), None);
        assert_eq!(classify(date(2026, 1, 2), &rules), None);
    }

    #[test]
    fn period_tags_parse_and_sort_like_their_names() {
        assert_eq!("dotcom".parse::<Period>(), Ok(Period::Dotcom));
        assert_eq!(" IA ".parse::<Period>(), Ok(Period::Ia));
        assert!("bubble".parse::<Period>().is_err());
        assert!(Period::Dotcom < Period::Ia);
        assert!(Period::Dotcom.as_str() < Period::Ia.as_str());
    }
}
