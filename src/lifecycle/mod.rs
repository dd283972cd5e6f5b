//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Reconcile log level → Start watcher → Start heartbeat
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Manual config reload
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Heartbeat exits → Watcher stops → Exit
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::{ProcessSignal, Signals};
pub use startup::{reload_and_reconcile, Service, StartupError, StartupOptions};
