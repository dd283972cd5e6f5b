//! Shared utilities for integration testing.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hmdp::observability::{LevelSink, LogLevel, LoggingError};
use tempfile::TempDir;

/// Render a full config document with the given log level and port.
pub fn config_body(level: &str, http_port: u16) -> String {
    format!(
        r#"
[server]
run_mode = "debug"
http_port = {http_port}
read_timeout_secs = 60
write_timeout_secs = 60

[storage]
user_name = "root"
password = "secret"
host = "127.0.0.1:3306"
db_name = "hmdp"
max_idle_conns = 10
max_open_conns = 100

[log]
filename = "./logs/hmdp.log"
level = "{level}"
"#
    )
}

/// A scratch directory holding `config.toml`.
pub fn config_dir(body: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, body).unwrap();
    (dir, path)
}

pub fn rewrite(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
}

/// Level sink that records every level it is asked to apply.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub applied: Arc<Mutex<Vec<LogLevel>>>,
}

impl LevelSink for RecordingSink {
    fn set_minimum_level(&self, level: LogLevel) -> Result<(), LoggingError> {
        self.applied.lock().unwrap().push(level);
        Ok(())
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
