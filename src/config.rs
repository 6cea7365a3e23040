use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::log_event;
use crate::period::{Period, PeriodRule};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("rolling window must cover at least 2 rows, got {0}")]
    WindowTooSmall(usize),
    #[error("date range starts after it ends: {start} > {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("periods {0} and {1} overlap")]
    OverlappingPeriods(Period, Period),
    #[error("primary and benchmark index share the display name `{0}`")]
    DuplicateIndexName(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Provider symbol plus the display name written to the `index` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub symbol: String,
    pub name: String,
}

impl IndexSpec {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
        }
    }
}

/// Static run configuration.
///
/// `primary` is the numerator and `benchmark` the denominator of the ratio series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub primary: IndexSpec,
    pub benchmark: IndexSpec,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub periods: Vec<PeriodRule>,
    pub rolling_window: usize,
}

pub const DEFAULT_ROLLING_WINDOW: usize = 30;

pub fn default_period_rules() -> Vec<PeriodRule> {
    vec![
        PeriodRule::new(Period::Dotcom, ymd(1997, 1, 1), ymd(2002, 12, 31)),
        PeriodRule::new(Period::Ia, ymd(2020, 1, 1), ymd(2025, 12, 31)),
    ]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            primary: IndexSpec::new("^IXIC", "NASDAQ"),
            benchmark: IndexSpec::new("^GSPC", "SP500"),
            start: ymd(1997, 1, 1),
            end: ymd(2025, 12, 31),
            periods: default_period_rules(),
            rolling_window: DEFAULT_ROLLING_WINDOW,
        }
    }
}

impl PipelineConfig {
    /// Load an override file. Missing fields fall back to the defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path_ref = path.as_ref();
        let display = path_ref.display().to_string();

        let contents = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|source| {
            log_event(
                file!(),
                "PipelineConfig",
                "from_json_file",
                "config.load",
                line!(),
                &format!("Rejected config file {display}"),
                Some(&source.to_string()),
            );
            ConfigError::Parse {
                path: display.clone(),
                source,
            }
        })?;
        config.validate()?;

        log_event(
            file!(),
            "PipelineConfig",
            "from_json_file",
            "config.load",
            line!(),
            &format!("Loaded config from {display}"),
            None,
        );

        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.rolling_window < 2 {
            return Err(ConfigError::WindowTooSmall(self.rolling_window));
        }
        if self.start > self.end {
            return Err(ConfigError::InvertedRange {
                start: self.start,
                end: self.end,
            });
        }
        if self.primary.name == self.benchmark.name {
            return Err(ConfigError::DuplicateIndexName(self.primary.name.clone()));
        }
        for (idx, rule) in self.periods.iter().enumerate() {
            if rule.start > rule.end {
                return Err(ConfigError::InvertedRange {
                    start: rule.start,
                    end: rule.end,
                });
            }
            if let Some(other) = self.periods[idx + 1..].iter().find(|o| rule.overlaps(o)) {
                return Err(ConfigError::OverlappingPeriods(rule.period, other.period));
            }
        }
        Ok(())
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rolling_window, 30);
        assert_eq!(config.primary.name, "NASDAQ");
        assert_eq!(config.benchmark.name, "SP500");
    }

    #[test]
    fn overlapping_periods_are_rejected() {
        let mut config = PipelineConfig::default();
        config.periods[1].start = ymd(2002, 6, 1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OverlappingPeriods(Period::Dotcom, Period::Ia))
        ));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"rolling_window": 20}"#).unwrap();
        assert_eq!(config.rolling_window, 20);
        assert_eq!(config.periods, default_period_rules());
    }
}
