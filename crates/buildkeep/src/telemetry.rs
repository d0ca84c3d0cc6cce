//! Structured telemetry for processes embedding the controller.
//!
//! Every lifecycle event and health notice is emitted under
//! [`EVENT_TARGET`]. Processes without a subscriber of their own call
//! [`initialise`] once at start-up, before building a
//! [`Lifecycle`](crate::Lifecycle). Processes that compose their own
//! subscriber should build its filter with [`lifecycle_filter`], or enable
//! [`EVENT_TARGET`] at `info` themselves, so operators still see daemon
//! starts and restarts.

use std::io::{self, IsTerminal};

use buildkeep_config::{Config, LogFormat};
use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::{EnvFilter, fmt};

use crate::report::EVENT_TARGET;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global tracing subscriber on first use.
///
/// Later calls return a fresh [`TelemetryHandle`] without touching global
/// state, so embedding applications may call this unconditionally.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or another
/// subscriber is already installed.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

/// Parses the configured filter and keeps lifecycle events at `info` or
/// finer.
///
/// A filter that names [`EVENT_TARGET`] itself is used unchanged, so
/// operators can still silence lifecycle events explicitly.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when the expression does not parse.
pub fn lifecycle_filter(config: &Config) -> Result<EnvFilter, TelemetryError> {
    let expression = config.log_filter();
    let filter =
        EnvFilter::try_new(expression).map_err(|error| TelemetryError::Filter(error.to_string()))?;
    if expression.contains(EVENT_TARGET) {
        return Ok(filter);
    }
    let level = filter
        .max_level_hint()
        .map_or(LevelFilter::INFO, |hint| hint.max(LevelFilter::INFO));
    let directive = format!("{EVENT_TARGET}={level}")
        .parse::<Directive>()
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;
    Ok(filter.add_directive(directive))
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = lifecycle_filter(config)?;

    let builder = |env_filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            // Health checks run on named threads.
            .with_thread_names(true)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
