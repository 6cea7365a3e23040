use thiserror::Error;

use crate::config::{ConfigError, IndexSpec, PipelineConfig};
use crate::dataset::{Dataset, DatasetError};
use crate::events::{EventSource, EventTableError};
use crate::fetch::{FetchError, SeriesFetcher};
use crate::logging::log_event;
use crate::metrics::{self, MetricsError};
use crate::period::classify_records;
use crate::ratio::RatioTable;
use crate::record::RawRecord;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to fetch {index}: {source}")]
    Fetch { index: String, source: FetchError },
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    #[error(transparent)]
    Events(#[from] EventTableError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Fetch → classify → metrics → ratio → events → assemble.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetch both indices and build the dataset. Either fetch failing aborts the run.
    pub fn run(&self, fetcher: &dyn SeriesFetcher, events: &EventSource) -> PipelineResult<Dataset> {
        let (primary, benchmark) = rayon::join(
            || self.fetch_index(fetcher, &self.config.primary),
            || self.fetch_index(fetcher, &self.config.benchmark),
        );

        let mut records = primary?;
        records.extend(benchmark?);
        self.build(records, events)
    }

    fn fetch_index(&self, fetcher: &dyn SeriesFetcher, index: &IndexSpec) -> PipelineResult<Vec<RawRecord>> {
        let bars = fetcher
            .fetch(&index.symbol, self.config.start, self.config.end)
            .map_err(|source| {
                log_event(
                    file!(),
                    "Pipeline",
                    "fetch_index",
                    "pipeline.fetch",
                    line!(),
                    &format!("Fetch of {} ({}) via {} failed", index.name, index.symbol, fetcher.name()),
                    Some(&source.to_string()),
                );
                PipelineError::Fetch {
                    index: index.name.clone(),
                    source,
                }
            })?;

        Ok(bars
            .into_iter()
            .map(|bar| RawRecord::from_bar(&index.name, bar))
            .collect())
    }

    /// The computational core, from raw records of both indices to the final table.
    pub fn build(&self, records: Vec<RawRecord>, events: &EventSource) -> PipelineResult<Dataset> {
        let tagged = classify_records(records, &self.config.periods);
        let ratios = RatioTable::build(
            tagged.iter().map(|record| &record.raw),
            &self.config.primary.name,
            &self.config.benchmark.name,
        );

        let groups = metrics::group_records(tagged);
        let mut rows = metrics::compute_all(&groups, self.config.rolling_window)?;
        ratios.apply(&mut rows);
        events.enrich(&mut rows);

        let dataset = Dataset::assemble(rows);
        log_event(
            file!(),
            "Pipeline",
            "build",
            "pipeline.build",
            line!(),
            &format!(
                "Built dataset: {} rows across {} groups, {} ratio dates",
                dataset.len(),
                groups.len(),
                ratios.len()
            ),
            None,
        );

        Ok(dataset)
    }
}
