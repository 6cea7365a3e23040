use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use bubblescope::logging::{self, log_event};
use bubblescope::views::drawdown_pct;
use bubblescope::{
    CsvFetcher, EventSource, Pipeline, PipelineConfig, SeriesFetcher, YahooFetcher,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Source {
    /// Yahoo Finance chart API.
    Yahoo,
    /// One CSV per symbol under --data-dir.
    Csv,
}

#[derive(Parser)]
#[command(
    name = "bubblescope",
    about = "Build the dot-com vs AI-era Nasdaq/S&P 500 metrics dataset"
)]
struct Cli {
    /// JSON file overriding the built-in index, range and period settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where daily bars come from.
    #[arg(long, value_enum, default_value_t = Source::Yahoo)]
    source: Source,

    /// Directory of per-symbol CSV files (with --source csv).
    #[arg(long, default_value = "data_raw")]
    data_dir: PathBuf,

    /// Event table CSV with `date` and `event_name` columns. Skipped if the file is absent.
    #[arg(long, default_value = "data_raw/events.csv")]
    events: PathBuf,

    /// Output dataset path.
    #[arg(long, default_value = "data_processed/indices_dotcom_ia_dataset.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    logging::init_logging()?;
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let pipeline = Pipeline::new(config)?;

    let events = EventSource::load(Some(&cli.events))
        .with_context(|| format!("loading event table {}", cli.events.display()))?;

    let fetcher: Box<dyn SeriesFetcher> = match cli.source {
        Source::Yahoo => Box::new(YahooFetcher::new()?),
        Source::Csv => Box::new(CsvFetcher::new(cli.data_dir.clone())),
    };

    let dataset = pipeline.run(fetcher.as_ref(), &events)?;
    dataset
        .write_csv(&cli.output)
        .with_context(|| format!("writing {}", cli.output.display()))?;

    let groups = dataset
        .rows()
        .chunk_by(|a, b| a.index_name() == b.index_name() && a.period == b.period);
    for group in groups {
        let first = &group[0];
        log_event(
            file!(),
            "main",
            "main",
            "cli.summary",
            line!(),
            &format!(
                "{}/{}: {} trading days, max drawdown {:.1}%",
                first.index_name(),
                first.period,
                group.len(),
                group.iter().map(drawdown_pct).fold(0.0, f64::min)
            ),
            None,
        );
    }

    Ok(())
}
