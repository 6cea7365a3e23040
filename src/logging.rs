use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use crate::Result;

static SUBSCRIBER: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// One pipeline diagnostic, serialized as the `json` field of the emitted tracing event.
#[derive(Debug, Serialize)]
pub struct LogEvent<'a> {
    pub filename: &'a str,
    pub timestamp: DateTime<Utc>,
    pub component: &'a str,
    pub function: &'a str,
    pub stage: &'a str,
    pub line_num: u32,
    pub error: Option<&'a str>,
    pub message: &'a str,
}

/// Initialize a tracing subscriber emitting JSON lines.
///
/// The filter defaults to `info` and honours `RUST_LOG`. Calling this function multiple
/// times is safe; only the first invocation installs the subscriber and every later call
/// reports the outcome of that first attempt.
pub fn init_logging() -> Result<()> {
    let result = SUBSCRIBER.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_target(false)
            .try_init()
            .map_err(|error| error.to_string())?;

        Ok(())
    });

    match result {
        Ok(()) => Ok(()),
        Err(message) => Err(anyhow!(message.clone())),
    }
}

/// Emit a structured log event. Events carrying an error are logged at `warn`.
pub fn log_event(
    filename: &str,
    component: &str,
    function: &str,
    stage: &str,
    line_num: u32,
    message: &str,
    error: Option<&str>,
) {
    let event = LogEvent {
        filename,
        timestamp: Utc::now(),
        component,
        function,
        stage,
        line_num,
        error,
        message,
    };

    match (serde_json::to_string(&event), error) {
        (Ok(serialized), Some(_)) => warn!(target: "bubblescope", json = %serialized),
        (Ok(serialized), None) => info!(target: "bubblescope", json = %serialized),
        (Err(_), Some(error)) => warn!(target: "bubblescope", message, error),
        (Err(_), None) => info!(target: "bubblescope", message),
    }
}
