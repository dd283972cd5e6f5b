//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & parse into a RawDocument)
//!     → section.rs (decode [server], [storage], [log] independently)
//!     → store.rs (publish an immutable Settings snapshot via ArcSwap)
//!     → shared via Arc<ConfigStore> to all subsystems
//!
//! On file change:
//!     watcher.rs detects change (debounced, one reload at a time)
//!     → ConfigStore::reload_all re-reads and re-decodes
//!     → failing sections keep their last good value
//!     → atomic swap of the snapshot
//!     → LevelCoordinator applies any [log] level delta
//! ```
//!
//! # Design Decisions
//! - `[server]` and `[storage]` are mandatory at startup; `[log]` is optional
//! - Reload failures never propagate; they are logged and contained
//! - Readers get `Arc` snapshots and never observe a half-applied reload

pub mod loader;
pub mod schema;
pub mod section;
pub mod store;
pub mod watcher;

pub use loader::{LoadError, RawDocument};
pub use schema::{LogSettings, ServerSettings, Settings, StorageSettings};
pub use section::{decode_section, SectionError, SectionKey};
pub use store::{ConfigSection, ConfigStore, ReloadStatus};
pub use watcher::{ChangeWatcher, WatchHandle, WatchRuntimeError, WatchSetupError, WatcherOptions};
