//! Configuration schema definitions.
//!
//! One struct per top-level section of the configuration document. All
//! types derive Serde traits so the section decoder can deserialize them
//! straight out of the parsed TOML table.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `[server]` section: HTTP front-end settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Run mode (e.g. "debug", "release").
    pub run_mode: String,

    /// Port the HTTP server binds to.
    pub http_port: u16,

    /// Request read timeout in seconds.
    pub read_timeout_secs: u64,

    /// Response write timeout in seconds.
    pub write_timeout_secs: u64,
}

impl ServerSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            run_mode: "debug".to_string(),
            http_port: 8080,
            read_timeout_secs: 60,
            write_timeout_secs: 60,
        }
    }
}

/// `[storage]` section: relational database connection settings.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSettings {
    pub user_name: String,
    pub password: String,

    /// Database host, `host:port`.
    pub host: String,

    pub db_name: String,

    /// Maximum idle connections kept in the pool.
    pub max_idle_conns: u32,

    /// Maximum open connections.
    pub max_open_conns: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            user_name: "root".to_string(),
            password: String::new(),
            host: "127.0.0.1:3306".to_string(),
            db_name: "hmdp".to_string(),
            max_idle_conns: 10,
            max_open_conns: 100,
        }
    }
}

// Keeps the password out of log lines.
impl std::fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSettings")
            .field("user_name", &self.user_name)
            .field("password", &"***")
            .field("host", &self.host)
            .field("db_name", &self.db_name)
            .field("max_idle_conns", &self.max_idle_conns)
            .field("max_open_conns", &self.max_open_conns)
            .finish()
    }
}

/// `[log]` section: logging destination, threshold and rotation policy.
///
/// Rotation fields are carried for the log sink; the configuration core
/// itself only acts on `level`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSettings {
    /// Destination file path.
    pub filename: String,

    /// Minimum level (debug, info, warn, error). Case-insensitive;
    /// anything else is treated as info.
    pub level: String,

    /// Rotate when the file exceeds this many megabytes.
    pub max_size_mb: u64,

    /// Number of rotated files to keep.
    pub max_backups: u32,

    /// Days to retain rotated files.
    pub max_age_days: u32,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filename: "./logs/hmdp.log".to_string(),
            level: "info".to_string(),
            max_size_mb: 100,
            max_backups: 5,
            max_age_days: 30,
        }
    }
}

/// A complete, immutable snapshot of every decoded section.
///
/// Sections are individually reference counted so a reload that only
/// changes one of them can carry the others over without copying.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server: Arc<ServerSettings>,
    pub storage: Arc<StorageSettings>,
    pub log: Arc<LogSettings>,
}
