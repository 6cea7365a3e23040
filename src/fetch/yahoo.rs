//! Yahoo Finance v8 chart API backend.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;

use super::{FetchError, FetchResult, SeriesFetcher};
use crate::logging::log_event;
use crate::record::RawBar;

const BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) bubblescope/0.1";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

pub struct YahooFetcher {
    client: Client,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooFetcher {
    pub fn new() -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Network {
                symbol: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end
            .succ_opt()
            .unwrap_or(end)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!(
            "{BASE_URL}/{symbol}?period1={start_ts}&period2={end_ts}&interval=1d&includeAdjustedClose=true"
        )
    }

    fn fetch_with_retry(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> FetchResult<Vec<RawBar>> {
        let url = Self::chart_url(symbol, start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.base_delay * 2u32.pow(attempt - 1));
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(FetchError::Network {
                        symbol: symbol.to_string(),
                        message: e.to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    return Err(FetchError::Network {
                        symbol: symbol.to_string(),
                        message: e.to_string(),
                    });
                }
            };

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                last_error = Some(FetchError::Status {
                    symbol: symbol.to_string(),
                    status: status.as_u16(),
                });
                continue;
            }
            if status == StatusCode::NOT_FOUND {
                return Err(FetchError::SymbolNotFound(symbol.to_string()));
            }
            if !status.is_success() {
                return Err(FetchError::Status {
                    symbol: symbol.to_string(),
                    status: status.as_u16(),
                });
            }

            let chart: ChartResponse = resp.json().map_err(|e| FetchError::ResponseFormat {
                symbol: symbol.to_string(),
                message: e.to_string(),
            })?;
            return parse_response(symbol, chart, start, end);
        }

        Err(last_error.unwrap_or_else(|| FetchError::Network {
            symbol: symbol.to_string(),
            message: "max retries exceeded".into(),
        }))
    }
}

fn parse_response(
    symbol: &str,
    resp: ChartResponse,
    start: NaiveDate,
    end: NaiveDate,
) -> FetchResult<Vec<RawBar>> {
    let format_error = |message: &str| FetchError::ResponseFormat {
        symbol: symbol.to_string(),
        message: message.to_string(),
    };

    let result = match (resp.chart.result, resp.chart.error) {
        (Some(result), _) => result,
        (None, Some(err)) if err.code == "Not Found" => {
            return Err(FetchError::SymbolNotFound(symbol.to_string()));
        }
        (None, Some(err)) => return Err(format_error(&format!("{}: {}", err.code, err.description))),
        (None, None) => return Err(format_error("empty result with no error")),
    };

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| format_error("result array is empty"))?;
    let timestamps = data.timestamp.unwrap_or_default();
    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| format_error("no quote data"))?;
    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let mut bars = Vec::with_capacity(timestamps.len());
    let mut skipped = 0usize;
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| format_error(&format!("invalid timestamp: {ts}")))?;

        // Bars without a close carry no usable price.
        let Some(close) = quote.close.get(i).copied().flatten() else {
            skipped += 1;
            continue;
        };
        let field = |values: &[Option<f64>]| values.get(i).copied().flatten().unwrap_or(f64::NAN);

        bars.push(RawBar {
            date,
            open: field(quote.open.as_slice()),
            high: field(quote.high.as_slice()),
            low: field(quote.low.as_slice()),
            close,
            adj_close: adj_closes
                .as_deref()
                .and_then(|v| v.get(i).copied().flatten())
                .unwrap_or(close),
            volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
        });
    }

    if skipped > 0 {
        log_event(
            file!(),
            "YahooFetcher",
            "parse_response",
            "fetch.parse",
            line!(),
            &format!("Skipped {skipped} bars without a close for {symbol}"),
            None,
        );
    }

    if bars.is_empty() {
        return Err(FetchError::EmptySeries {
            symbol: symbol.to_string(),
            start,
            end,
        });
    }

    bars.sort_by_key(|bar| bar.date);
    Ok(bars)
}

impl SeriesFetcher for YahooFetcher {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> FetchResult<Vec<RawBar>> {
        let bars = self.fetch_with_retry(symbol, start, end).inspect_err(|error| {
            log_event(
                file!(),
                "YahooFetcher",
                "fetch",
                "fetch.request",
                line!(),
                &format!("Failed to fetch {symbol}"),
                Some(&error.to_string()),
            );
        })?;

        log_event(
            file!(),
            "YahooFetcher",
            "fetch",
            "fetch.request",
            line!(),
            &format!("Fetched {} bars for {symbol} ({start} to {end})", bars.len()),
            None,
        );

        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_chart_payload_and_skips_closeless_bars() {
        let payload = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1609770600, 1609857000, 1609943400],
                    "indicators": {
                        "quote": [{
                            "open": [100.0, null, 102.0],
                            "high": [101.0, null, 103.0],
                            "low": [99.0, null, 101.0],
                            "close": [100.5, null, 102.5],
                            "volume": [1000, null, 1200]
                        }],
                        "adjclose": [{"adjclose": [100.5, null, 102.5]}]
                    }
                }],
                "error": null
            }
        }"#;
        let chart: ChartResponse = serde_json::from_str(payload).unwrap();
        let bars = parse_response("^IXIC", chart, date(2021, 1, 1), date(2021, 1, 31)).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, date(2021, 1, 4));
        assert_eq!(bars[1].date, date(2021, 1, 6));
        assert_eq!(bars[1].volume, 1200);
    }

    #[test]
    fn not_found_error_maps_to_unknown_symbol() {
        let payload = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found"}}}"#;
        let chart: ChartResponse = serde_json::from_str(payload).unwrap();
        let error = parse_response("^NOPE", chart, date(2021, 1, 1), date(2021, 1, 31)).unwrap_err();
        assert!(matches!(error, FetchError::SymbolNotFound(symbol) if symbol == "^NOPE"));
    }

    #[test]
    fn chart_url_covers_the_end_date() {
        let url = YahooFetcher::chart_url("^GSPC", date(1997, 1, 1), date(1997, 1, 2));
        assert!(url.contains("/^GSPC?period1=852076800&period2=852249600"));
    }
}
