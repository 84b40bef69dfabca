use std::io;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;

use crate::settings::{LogFormat, LoggingSettings};

const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber. Logs go to stderr so stdout stays clean
/// for command output.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), String> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(settings.filter.as_deref().unwrap_or(DEFAULT_FILTER))
            .map_err(|err| format!("invalid log filter: {err}"))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match settings.format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(io::stderr),
            )
            .try_init(),
    };
    installed.map_err(|err| err.to_string())
}
