//! hmdp service entry point.
//!
//! Loads the configuration named on the command line, keeps it in sync with
//! the file on disk, and runs until SIGINT/SIGTERM.
//!
//! ```text
//!   config.toml ──notify──▶ ChangeWatcher ──debounce──▶ ConfigStore::reload_all
//!                                                          │
//!                                      Arc<Settings> ◀─────┤ (ArcSwap)
//!                                                          ▼
//!                                                  LevelCoordinator
//!                                                          │
//!                                                          ▼
//!                                           tracing reload handle (level)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use hmdp::lifecycle::{ProcessSignal, Service, Signals, StartupOptions};
use hmdp::observability::{init_logging, metrics, LogFormat, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "hmdp")]
#[command(about = "hmdp service with hot-reloadable configuration", long_about = None)]
struct Args {
    /// Config file path.
    #[arg(short, long, default_value = "./resource/config.toml")]
    config: PathBuf,

    /// Debounce window for file change events, in milliseconds.
    #[arg(long, default_value_t = 250)]
    debounce_ms: u64,

    /// Do not watch the config file (SIGHUP still reloads).
    #[arg(long)]
    no_watch: bool,

    /// Log output format: pretty or json.
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    metrics_address: Option<SocketAddr>,

    /// Heartbeat log period in seconds; 0 disables it.
    #[arg(long, default_value_t = 10)]
    heartbeat_secs: u64,
}

impl Args {
    fn startup_options(&self) -> StartupOptions {
        StartupOptions {
            config_path: self.config.clone(),
            watch: !self.no_watch,
            debounce: Duration::from_millis(self.debounce_ms),
            heartbeat: Duration::from_secs(self.heartbeat_secs),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let installed = LogLevel::default();
    let sink = match init_logging(installed, args.log_format) {
        Ok(sink) => sink,
        Err(e) => {
            eprintln!("hmdp: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "hmdp starting");

    if let Some(addr) = args.metrics_address {
        metrics::init_metrics(addr);
    }

    let service = match Service::start(args.startup_options(), installed, Box::new(sink)) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            eprintln!("hmdp: startup failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut signals = match Signals::new() {
        Ok(signals) => signals,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register signal handlers");
            service.shutdown().await;
            return ExitCode::FAILURE;
        }
    };

    loop {
        match signals.recv().await {
            ProcessSignal::Reload => {
                tracing::info!("SIGHUP received, reloading configuration");
                // File I/O; keep it off the async workers.
                let status = tokio::task::block_in_place(|| service.reload());
                tracing::info!(?status, "Manual reload finished");
            }
            ProcessSignal::Shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    service.shutdown().await;
    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
