//! Runtime log level coordination.
//!
//! # Responsibilities
//! - Parse configured level strings into [`LogLevel`]
//! - Hold the effective threshold in [`ActiveLevel`]
//! - Apply level deltas from reloaded `[log]` sections via [`LevelCoordinator`]

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{ConfigStore, LogSettings};
use crate::observability::logging::LoggingError;
use crate::observability::metrics;

/// Minimum severity a log event needs to be emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    Debug = 0,
    #[default]
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    /// Parse a configured level. Case-insensitive; unknown input is `Info`.
    pub fn parse_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for tracing::level_filters::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => tracing::level_filters::LevelFilter::DEBUG,
            LogLevel::Info => tracing::level_filters::LevelFilter::INFO,
            LogLevel::Warn => tracing::level_filters::LevelFilter::WARN,
            LogLevel::Error => tracing::level_filters::LevelFilter::ERROR,
        }
    }
}

/// Shared cell holding the currently effective minimum level.
///
/// Clones share the same cell.
#[derive(Debug, Clone)]
pub struct ActiveLevel {
    inner: Arc<AtomicU8>,
}

impl ActiveLevel {
    pub fn new(initial: LogLevel) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(initial as u8)),
        }
    }

    pub fn get(&self) -> LogLevel {
        LogLevel::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// Whether an event at `level` passes the current threshold.
    pub fn allows(&self, level: LogLevel) -> bool {
        level >= self.get()
    }

    fn set(&self, level: LogLevel) {
        self.inner.store(level as u8, Ordering::Release);
    }
}

/// The live logging subsystem, as seen by the coordinator.
pub trait LevelSink: Send + Sync {
    fn set_minimum_level(&self, level: LogLevel) -> Result<(), LoggingError>;
}

/// A level transition applied by [`LevelCoordinator::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub from: LogLevel,
    pub to: LogLevel,
}

/// Applies the `[log]` level to the logging sink when it changes.
///
/// Compare, apply and store happen under one lock, so concurrent reconciles
/// never interleave.
pub struct LevelCoordinator {
    active: ActiveLevel,
    sink: Box<dyn LevelSink>,
    apply_lock: Mutex<()>,
}

impl LevelCoordinator {
    pub fn new(active: ActiveLevel, sink: Box<dyn LevelSink>) -> Self {
        metrics::record_active_level(active.get());
        Self {
            active,
            sink,
            apply_lock: Mutex::new(()),
        }
    }

    pub fn active(&self) -> &ActiveLevel {
        &self.active
    }

    /// Compare `settings.level` with the active level and apply it if it differs.
    pub fn reconcile(&self, settings: &LogSettings) -> Option<LevelChange> {
        let _guard = self.lock();
        self.apply(settings)
    }

    /// Reconcile against the store's current `[log]` section.
    ///
    /// The section is read after the lock is taken: whichever reconcile runs
    /// last applies the newest snapshot.
    pub fn reconcile_latest(&self, store: &ConfigStore) -> Option<LevelChange> {
        let _guard = self.lock();
        self.apply(&store.log())
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.apply_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply(&self, settings: &LogSettings) -> Option<LevelChange> {
        let to = LogLevel::parse_lossy(&settings.level);
        let from = self.active.get();
        if from == to {
            return None;
        }

        // The cell moves only after the sink accepts the level.
        if let Err(e) = self.sink.set_minimum_level(to) {
            tracing::warn!(error = %e, from = %from, to = %to, "Failed to apply log level");
            return None;
        }
        self.active.set(to);
        metrics::record_active_level(to);

        tracing::info!(from = %from, to = %to, "Log level updated");
        Some(LevelChange { from, to })
    }
}
