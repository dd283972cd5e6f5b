//! The live configuration store.
//!
//! Holds the current [`Settings`] snapshot behind an [`ArcSwap`]. Readers
//! load an `Arc` without locking and keep it for as long as they like; a
//! reload publishes a fresh snapshot and never mutates one a reader holds.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::config::loader::{decode_initial, decode_over, read_document, LoadError};
use crate::config::schema::{LogSettings, ServerSettings, Settings, StorageSettings};
use crate::config::section::SectionKey;
use crate::observability::metrics;

/// A typed view of one section, as returned by [`ConfigStore::get`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSection {
    Server(Arc<ServerSettings>),
    Storage(Arc<StorageSettings>),
    Log(Arc<LogSettings>),
}

impl ConfigSection {
    pub fn key(&self) -> SectionKey {
        match self {
            ConfigSection::Server(_) => SectionKey::Server,
            ConfigSection::Storage(_) => SectionKey::Storage,
            ConfigSection::Log(_) => SectionKey::Log,
        }
    }
}

/// Result of [`ConfigStore::reload_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadStatus {
    /// Every section decoded and the new snapshot is live.
    Applied,
    /// The snapshot is live but the listed sections kept their old values.
    Partial { failed: Vec<SectionKey> },
    /// The file could not be read or parsed; nothing changed.
    Retained,
}

impl ReloadStatus {
    /// Whether a new snapshot was published.
    pub fn is_published(&self) -> bool {
        !matches!(self, ReloadStatus::Retained)
    }

    fn outcome(&self) -> &'static str {
        match self {
            ReloadStatus::Applied => "applied",
            ReloadStatus::Partial { .. } => "partial",
            ReloadStatus::Retained => "retained",
        }
    }
}

/// Process-wide configuration holder.
///
/// Constructed only through [`ConfigStore::load`], so a value of this type
/// always holds a complete set of sections. Share it with `Arc`.
pub struct ConfigStore {
    path: PathBuf,
    current: ArcSwap<Settings>,
    generation: AtomicU64,
    /// Serializes writers; readers never take it.
    reload_lock: Mutex<()>,
}

impl ConfigStore {
    /// Read `path` and decode every section.
    ///
    /// Fails if the file cannot be read or parsed, or if a mandatory
    /// section is missing or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref().to_path_buf();
        let document = read_document(&path)?;
        let settings = decode_initial(&document)?;

        tracing::info!(
            path = %path.display(),
            http_port = settings.server.http_port,
            storage_host = %settings.storage.host,
            log_level = %settings.log.level,
            "Configuration loaded"
        );

        Ok(Self {
            path,
            current: ArcSwap::from_pointee(settings),
            generation: AtomicU64::new(1),
            reload_lock: Mutex::new(()),
        })
    }

    /// Re-read the file and republish every section that decodes.
    ///
    /// Failures are contained: they are logged, and affected sections keep
    /// their last good value.
    pub fn reload_all(&self) -> ReloadStatus {
        // A poisoned lock only means a previous reload panicked; the
        // snapshot itself is still consistent.
        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let status = match read_document(&self.path) {
            Ok(document) => {
                let previous = self.current.load_full();
                let (next, failed) = decode_over(&document, &previous);

                for (key, e) in &failed {
                    tracing::error!(
                        section = %key,
                        error = %e,
                        "Failed to reload section, keeping previous value"
                    );
                }

                self.current.store(Arc::new(next));
                let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

                if failed.is_empty() {
                    tracing::info!(generation, "Configuration reloaded");
                    ReloadStatus::Applied
                } else {
                    let failed: Vec<SectionKey> = failed.into_iter().map(|(k, _)| k).collect();
                    tracing::warn!(generation, ?failed, "Configuration partially reloaded");
                    ReloadStatus::Partial { failed }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config. Keeping current configuration.");
                ReloadStatus::Retained
            }
        };

        metrics::record_reload(status.outcome());
        status
    }

    /// Current value of one section.
    pub fn get(&self, key: SectionKey) -> ConfigSection {
        let snapshot = self.current.load();
        match key {
            SectionKey::Server => ConfigSection::Server(Arc::clone(&snapshot.server)),
            SectionKey::Storage => ConfigSection::Storage(Arc::clone(&snapshot.storage)),
            SectionKey::Log => ConfigSection::Log(Arc::clone(&snapshot.log)),
        }
    }

    /// The whole current snapshot.
    pub fn snapshot(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    pub fn server(&self) -> Arc<ServerSettings> {
        Arc::clone(&self.current.load().server)
    }

    pub fn storage(&self) -> Arc<StorageSettings> {
        Arc::clone(&self.current.load().storage)
    }

    pub fn log(&self) -> Arc<LogSettings> {
        Arc::clone(&self.current.load().log)
    }

    /// Path the store was loaded from and reloads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of snapshots published so far, starting at 1 for the initial load.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("path", &self.path)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::section::decode_section;
    use std::fs;
    use std::thread;
    use tempfile::tempdir;

    const V1: &str = r#"
        [server]
        run_mode = "debug"
        http_port = 8081
        read_timeout_secs = 10
        write_timeout_secs = 10

        [storage]
        user_name = "root"
        password = "secret"
        host = "127.0.0.1:3306"
        db_name = "hmdp"
        max_idle_conns = 10
        max_open_conns = 100

        [log]
        filename = "./logs/app.log"
        level = "info"
    "#;

    #[test]
    fn test_get_matches_direct_decode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, V1).unwrap();

        let store = ConfigStore::load(&path).unwrap();
        let doc = read_document(&path).unwrap();

        let server: ServerSettings = decode_section(&doc, SectionKey::Server).unwrap();
        let storage: StorageSettings = decode_section(&doc, SectionKey::Storage).unwrap();
        let log: LogSettings = decode_section(&doc, SectionKey::Log).unwrap();

        assert_eq!(store.get(SectionKey::Server), ConfigSection::Server(Arc::new(server)));
        assert_eq!(store.get(SectionKey::Storage), ConfigSection::Storage(Arc::new(storage)));
        assert_eq!(store.get(SectionKey::Log), ConfigSection::Log(Arc::new(log)));
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn test_reload_unchanged_file_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, V1).unwrap();

        let store = ConfigStore::load(&path).unwrap();
        let before = store.snapshot();

        assert_eq!(store.reload_all(), ReloadStatus::Applied);

        let after = store.snapshot();
        assert_eq!(*before, *after);
        assert!(Arc::ptr_eq(&before.server, &after.server));
        assert!(Arc::ptr_eq(&before.storage, &after.storage));
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn test_missing_storage_fails_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server]\nhttp_port = 8081\n").unwrap();

        let err = ConfigStore::load(&path).unwrap_err();
        assert!(matches!(err, LoadError::MandatorySection(_)));
        assert!(err.to_string().contains("[storage]"));
    }

    #[test]
    fn test_unparseable_rewrite_keeps_previous_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, V1).unwrap();

        let store = ConfigStore::load(&path).unwrap();
        let server_before = store.server();

        fs::write(&path, "[server\nhttp_port = ").unwrap();
        assert_eq!(store.reload_all(), ReloadStatus::Retained);

        assert_eq!(store.server(), server_before);
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn test_reload_missing_mandatory_section_is_contained() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, V1).unwrap();

        let store = ConfigStore::load(&path).unwrap();
        let storage_before = store.storage();

        fs::write(&path, "[server]\nhttp_port = 9090\n[log]\nlevel = \"debug\"\n").unwrap();
        let status = store.reload_all();

        assert_eq!(status, ReloadStatus::Partial { failed: vec![SectionKey::Storage] });
        assert_eq!(store.server().http_port, 9090);
        assert_eq!(store.log().level, "debug");
        assert_eq!(store.storage(), storage_before);
    }

    #[test]
    fn test_readers_see_whole_snapshots_during_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, V1).unwrap();

        let store = Arc::new(ConfigStore::load(&path).unwrap());

        let mut readers = vec![];
        for _ in 0..4 {
            let store = Arc::clone(&store);
            readers.push(thread::spawn(move || {
                for _ in 0..500 {
                    let server = store.server();
                    // Port and run mode are always written together.
                    match server.http_port {
                        8081 => assert_eq!(server.run_mode, "debug"),
                        9091 => assert_eq!(server.run_mode, "release"),
                        other => panic!("torn read: port {other}"),
                    }
                }
            }));
        }

        let v2 = V1
            .replace("http_port = 8081", "http_port = 9091")
            .replace("run_mode = \"debug\"", "run_mode = \"release\"");
        for i in 0..10 {
            let body = if i % 2 == 0 { v2.as_str() } else { V1 };
            fs::write(&path, body).unwrap();
            store.reload_all();
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
