//! Tracing subscriber setup for the `demokit` binary

use crate::error::ServerError;
use demokit_core::LogFormat;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Build the event filter: `RUST_LOG` when set, otherwise `default_filter`
///
/// # Errors
/// Returns `ServerError::Telemetry` when neither filter parses.
pub fn filter(default_filter: &str) -> Result<EnvFilter, ServerError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| ServerError::Telemetry(format!("log filter {default_filter:?}: {e}"))),
    }
}

/// Install the global subscriber
///
/// # Errors
/// Returns `ServerError::Telemetry` on a bad filter or when a subscriber is
/// already installed.
pub fn init(default_filter: &str, format: LogFormat) -> Result<(), ServerError> {
    let filter = filter(default_filter)?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|e| ServerError::Telemetry(e.to_string()))
}
