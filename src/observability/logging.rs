//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Expose a handle that changes the minimum level at runtime
//!
//! # Design Decisions
//! - The level filter sits in a `reload` layer so a config reload can move
//!   the threshold without rebuilding the subscriber
//! - JSON format (with file/line) for production, pretty format for development

use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, Registry};

use crate::observability::level::{LevelSink, LogLevel};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to install log subscriber: {0}")]
    Install(String),

    #[error("failed to change log level: {0}")]
    Reload(String),
}

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format `{other}` (expected pretty or json)")),
        }
    }
}

/// [`LevelSink`] backed by a `tracing_subscriber` reload handle.
#[derive(Clone)]
pub struct TracingLevelSink {
    handle: reload::Handle<LevelFilter, Registry>,
}

impl TracingLevelSink {
    /// A reloadable level filter and the sink that controls it.
    pub fn layer(initial: LogLevel) -> (reload::Layer<LevelFilter, Registry>, Self) {
        let (layer, handle) = reload::Layer::new(LevelFilter::from(initial));
        (layer, Self { handle })
    }
}

impl LevelSink for TracingLevelSink {
    fn set_minimum_level(&self, level: LogLevel) -> Result<(), LoggingError> {
        self.handle
            .reload(LevelFilter::from(level))
            .map_err(|e| LoggingError::Reload(e.to_string()))
    }
}

/// Install the global subscriber at `initial` and return its level sink.
pub fn init_logging(initial: LogLevel, format: LogFormat) -> Result<TracingLevelSink, LoggingError> {
    let (filter, sink) = TracingLevelSink::layer(initial);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_file(true).with_line_number(true))
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
    };
    installed.map_err(|e| LoggingError::Install(e.to_string()))?;

    Ok(sink)
}
