//! Configuration file watcher for hot reload.
//!
//! `notify` delivers raw filesystem events on its own thread. They are
//! forwarded into a queue drained by a single Tokio task, which debounces
//! them and runs the reload callback one invocation at a time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Window during which further change events are folded into one reload.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// The watch could not be established.
#[derive(Debug, Error)]
pub enum WatchSetupError {
    #[error("config file {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("failed to watch {}: {source}", .path.display())]
    Notify {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// The watch broke after it was established. The watcher stops.
#[derive(Debug, Error)]
pub enum WatchRuntimeError {
    #[error("watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error("config file {} was removed", .0.display())]
    FileRemoved(PathBuf),
}

#[derive(Debug, Clone)]
pub struct WatcherOptions {
    pub debounce: Duration,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// What the notify callback forwards to the watch task.
#[derive(Debug)]
enum Signal {
    Changed,
    /// Removed or renamed; whether it came back is checked after the debounce.
    Moved,
    Failed(notify::Error),
}

/// Handle to a running watch. Dropping it stops the watch.
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
    reloads: Arc<AtomicU64>,
}

impl WatchHandle {
    /// Number of times the callback has run.
    pub fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::Acquire)
    }

    /// False once the watch task has exited, e.g. after a runtime error.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop watching and wait for an in-flight reload to finish.
    pub async fn stop(self) {
        let WatchHandle {
            _watcher,
            stop_tx,
            task,
            ..
        } = self;
        drop(_watcher);
        let _ = stop_tx.send(());
        let _ = task.await;
    }
}

pub struct ChangeWatcher;

impl ChangeWatcher {
    /// Watch `path` and run `on_change` after each (debounced) modification.
    ///
    /// Must be called from within a Tokio runtime. `on_change` runs on the
    /// blocking pool and never overlaps with itself.
    pub fn start<F>(
        path: &Path,
        options: WatcherOptions,
        on_change: F,
    ) -> Result<WatchHandle, WatchSetupError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if !path.is_file() {
            return Err(WatchSetupError::NotFound(path.to_path_buf()));
        }

        let target = path.to_path_buf();
        let (tx, rx) = mpsc::unbounded_channel();

        let file_name = target.file_name().map(|n| n.to_os_string());
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let signal = match res {
                Ok(event) => {
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if !ours {
                        return;
                    }
                    match event.kind {
                        EventKind::Modify(ModifyKind::Name(_)) | EventKind::Remove(_) => Signal::Moved,
                        EventKind::Create(_) | EventKind::Modify(_) => Signal::Changed,
                        _ => return,
                    }
                }
                Err(e) => Signal::Failed(e),
            };
            let _ = tx.send(signal);
        })
        .map_err(|source| WatchSetupError::Notify {
            path: target.clone(),
            source,
        })?;

        // Watch the directory: editors that save via rename replace the inode.
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchSetupError::Notify {
                path: target.clone(),
                source,
            })?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let reloads = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(watch_loop(
            target.clone(),
            options.debounce,
            rx,
            stop_rx,
            Arc::new(on_change),
            Arc::clone(&reloads),
        ));

        tracing::info!(path = %target.display(), debounce_ms = options.debounce.as_millis() as u64, "Config watcher started");

        Ok(WatchHandle {
            _watcher: watcher,
            stop_tx,
            task,
            reloads,
        })
    }
}

async fn watch_loop<F>(
    target: PathBuf,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<Signal>,
    mut stop_rx: oneshot::Receiver<()>,
    on_change: Arc<F>,
    reloads: Arc<AtomicU64>,
) where
    F: Fn() + Send + Sync + 'static,
{
    loop {
        let first = tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            signal = rx.recv() => match signal {
                Some(signal) => signal,
                None => break,
            },
        };

        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            _ = tokio::time::sleep(debounce) => {}
        }

        let mut moved = false;
        let mut failure = None;
        let mut pending = Some(first);
        while let Some(signal) = pending.take().or_else(|| rx.try_recv().ok()) {
            match signal {
                Signal::Changed => {}
                Signal::Moved => moved = true,
                Signal::Failed(e) => failure = Some(e),
            }
        }

        if let Some(e) = failure {
            let e = WatchRuntimeError::from(e);
            tracing::error!(path = %target.display(), error = %e, "Config watcher failed, hot reload disabled");
            break;
        }
        if moved && !target.exists() {
            let e = WatchRuntimeError::FileRemoved(target.clone());
            tracing::error!(error = %e, "Config watcher failed, hot reload disabled");
            break;
        }

        tracing::info!(path = %target.display(), "Config file change detected, reloading...");
        let callback = Arc::clone(&on_change);
        match tokio::task::spawn_blocking(move || callback()).await {
            Ok(()) => {
                reloads.fetch_add(1, Ordering::AcqRel);
            }
            Err(e) => tracing::error!(error = %e, "Reload callback panicked"),
        }
    }

    tracing::info!(path = %target.display(), "Config watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_is_setup_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = ChangeWatcher::start(&path, WatcherOptions::default(), || {}).err().unwrap();
        assert!(matches!(err, WatchSetupError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_change_invokes_callback() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "a = 1\n").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = ChangeWatcher::start(
            &path,
            WatcherOptions {
                debounce: Duration::from_millis(50),
            },
            move || {
                let _ = tx.send(());
            },
        )
        .unwrap();

        fs::write(&path, "a = 2\n").unwrap();

        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("reload not triggered")
            .unwrap();
        assert!(handle.is_running());

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_other_files_are_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "a = 1\n").unwrap();

        let handle = ChangeWatcher::start(
            &path,
            WatcherOptions {
                debounce: Duration::from_millis(50),
            },
            || {},
        )
        .unwrap();

        fs::write(dir.path().join("unrelated.txt"), "noise").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.reload_count(), 0);

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_removed_file_stops_watcher() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "a = 1\n").unwrap();

        let handle = ChangeWatcher::start(
            &path,
            WatcherOptions {
                debounce: Duration::from_millis(50),
            },
            || {},
        )
        .unwrap();

        fs::remove_file(&path).unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while handle.is_running() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!handle.is_running());
        assert_eq!(handle.reload_count(), 0);
    }

    #[tokio::test]
    async fn test_rename_over_target_reloads_and_keeps_watching() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "a = 1\n").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = ChangeWatcher::start(
            &path,
            WatcherOptions {
                debounce: Duration::from_millis(50),
            },
            move || {
                let _ = tx.send(());
            },
        )
        .unwrap();

        // Editor-style save: write a sibling, then rename it over the target.
        let staged = dir.path().join("config.toml.tmp");
        fs::write(&staged, "a = 2\n").unwrap();
        fs::rename(&staged, &path).unwrap();

        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("reload not triggered by rename")
            .unwrap();
        assert!(handle.is_running());
        assert!(handle.reload_count() >= 1);

        handle.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_changes_during_callback_queue_one_follow_up() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "a = 1\n").unwrap();

        let started = Arc::new(AtomicU64::new(0));
        let in_flight = Arc::new(AtomicU64::new(0));
        let max_in_flight = Arc::new(AtomicU64::new(0));

        let handle = {
            let started = Arc::clone(&started);
            let in_flight = Arc::clone(&in_flight);
            let max_in_flight = Arc::clone(&max_in_flight);
            ChangeWatcher::start(
                &path,
                WatcherOptions {
                    debounce: Duration::from_millis(50),
                },
                move || {
                    started.fetch_add(1, Ordering::AcqRel);
                    let now = in_flight.fetch_add(1, Ordering::AcqRel) + 1;
                    max_in_flight.fetch_max(now, Ordering::AcqRel);
                    // Outlast the debounce window several times over.
                    std::thread::sleep(Duration::from_millis(400));
                    in_flight.fetch_sub(1, Ordering::AcqRel);
                },
            )
            .unwrap()
        };

        fs::write(&path, "a = 2\n").unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while started.load(Ordering::Acquire) == 0 {
            assert!(tokio::time::Instant::now() < deadline, "first reload never started");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Both land while the first callback is still sleeping.
        fs::write(&path, "a = 3\n").unwrap();
        fs::write(&path, "a = 4\n").unwrap();

        while handle.reload_count() < 2 {
            assert!(tokio::time::Instant::now() < deadline, "follow-up reload never ran");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(handle.reload_count(), 2);
        assert_eq!(started.load(Ordering::Acquire), 2);
        assert_eq!(max_in_flight.load(Ordering::Acquire), 1);

        handle.stop().await;
    }
}
