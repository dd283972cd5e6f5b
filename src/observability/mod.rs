//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! ConfigStore::reload_all
//!     → level.rs (LevelCoordinator compares [log] level with ActiveLevel)
//!     → logging.rs (reload handle moves the subscriber threshold)
//!     → metrics.rs (reload outcome counter, active level gauge)
//! ```
//!
//! # Design Decisions
//! - Structured logging through `tracing` everywhere
//! - The active level is an atomic cell; readers never lock
//! - Metrics are optional and cheap when no recorder is installed

pub mod level;
pub mod logging;
pub mod metrics;

pub use level::{ActiveLevel, LevelChange, LevelCoordinator, LevelSink, LogLevel};
pub use logging::{init_logging, LogFormat, LoggingError, TracingLevelSink};
