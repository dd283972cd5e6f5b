//! Hot-reloadable configuration core for the hmdp service.
//!
//! A [`ConfigStore`] holds the typed `[server]`, `[storage]` and `[log]`
//! sections of a TOML file. A [`ChangeWatcher`] re-reads the file when it
//! changes, and a [`LevelCoordinator`] moves the live log threshold when the
//! `[log]` level does.

pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::{ChangeWatcher, ConfigStore};
pub use lifecycle::{Service, Shutdown};
pub use observability::LevelCoordinator;
