//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the configuration (fail fast on mandatory sections)
//! - Bring the log level in line with the `[log]` section
//! - Start the file watcher and the heartbeat task
//!
//! # Design Decisions
//! - Subsystems initialize in order, not concurrently
//! - Any startup error is fatal; any later reload error is contained

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::watcher::DEFAULT_DEBOUNCE;
use crate::config::{
    ChangeWatcher, ConfigStore, LoadError, ReloadStatus, WatchHandle, WatchSetupError,
    WatcherOptions,
};
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::observability::{ActiveLevel, LevelCoordinator, LevelSink, LogLevel};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Watch(#[from] WatchSetupError),
}

#[derive(Debug, Clone)]
pub struct StartupOptions {
    pub config_path: PathBuf,

    /// Disable to run on the startup snapshot (SIGHUP still reloads).
    pub watch: bool,

    pub debounce: Duration,

    /// Period of the heartbeat log line; zero disables it.
    pub heartbeat: Duration,
}

impl Default for StartupOptions {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("./resource/config.toml"),
            watch: true,
            debounce: DEFAULT_DEBOUNCE,
            heartbeat: Duration::from_secs(10),
        }
    }
}

/// Reload the store and, if anything was published, reconcile the log level.
pub fn reload_and_reconcile(store: &ConfigStore, coordinator: &LevelCoordinator) -> ReloadStatus {
    let status = store.reload_all();
    if status.is_published() {
        coordinator.reconcile_latest(store);
    }
    status
}

/// The running configuration subsystem.
pub struct Service {
    store: Arc<ConfigStore>,
    coordinator: Arc<LevelCoordinator>,
    watch: Option<WatchHandle>,
    shutdown: Shutdown,
    heartbeat: Option<JoinHandle<()>>,
}

impl Service {
    /// Start everything. `installed` is the level the sink is currently at.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        options: StartupOptions,
        installed: LogLevel,
        sink: Box<dyn LevelSink>,
    ) -> Result<Self, StartupError> {
        let store = Arc::new(ConfigStore::load(&options.config_path)?);

        let coordinator = Arc::new(LevelCoordinator::new(ActiveLevel::new(installed), sink));
        coordinator.reconcile(&store.log());

        let watch = if options.watch {
            let reload_store = Arc::clone(&store);
            let reload_coordinator = Arc::clone(&coordinator);
            let handle = ChangeWatcher::start(
                store.path(),
                WatcherOptions {
                    debounce: options.debounce,
                },
                move || {
                    reload_and_reconcile(&reload_store, &reload_coordinator);
                },
            )?;
            Some(handle)
        } else {
            tracing::info!("Config watcher disabled");
            None
        };

        let shutdown = Shutdown::new();
        let heartbeat = (!options.heartbeat.is_zero()).then(|| {
            tokio::spawn(run_heartbeat(
                Arc::clone(&store),
                options.heartbeat,
                shutdown.signal(),
            ))
        });

        Ok(Self {
            store,
            coordinator,
            watch,
            shutdown,
            heartbeat,
        })
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn active_level(&self) -> &ActiveLevel {
        self.coordinator.active()
    }

    pub fn watch(&self) -> Option<&WatchHandle> {
        self.watch.as_ref()
    }

    /// Manual reload, e.g. on SIGHUP.
    pub fn reload(&self) -> ReloadStatus {
        reload_and_reconcile(&self.store, &self.coordinator)
    }

    /// Stop background tasks and wait for them.
    pub async fn shutdown(self) {
        self.shutdown.trigger();
        if let Some(heartbeat) = self.heartbeat {
            let _ = heartbeat.await;
        }
        if let Some(watch) = self.watch {
            watch.stop().await;
        }
        tracing::info!("Configuration subsystem stopped");
    }
}

/// Periodic log lines at several levels, so a level change is visible in
/// the output without any traffic.
async fn run_heartbeat(store: Arc<ConfigStore>, period: Duration, mut shutdown: ShutdownSignal) {
    let mut ticker = time::interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let server = store.server();
                tracing::debug!(
                    run_mode = %server.run_mode,
                    http_port = server.http_port,
                    generation = store.generation(),
                    "Heartbeat"
                );
                tracing::info!(generation = store.generation(), "Service alive");
                tracing::error!(generation = store.generation(), "Heartbeat at error level");
            }
            _ = shutdown.wait() => break,
        }
    }
}
