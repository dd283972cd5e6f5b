//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::schema::{LogSettings, ServerSettings, Settings, StorageSettings};
use crate::config::section::{decode_section, SectionError, SectionKey};

/// The parsed configuration document, keyed by top-level section name.
pub type RawDocument = toml::Table;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A section required for startup is missing or malformed.
    #[error("mandatory {0}")]
    MandatorySection(#[source] SectionError),
}

/// Read and parse the document at `path`.
pub fn read_document(path: &Path) -> Result<RawDocument, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode every section for the initial load.
///
/// Mandatory sections escalate to [`LoadError::MandatorySection`]. A bad or
/// absent `[log]` section is logged and replaced with defaults.
pub fn decode_initial(document: &RawDocument) -> Result<Settings, LoadError> {
    let server: ServerSettings =
        decode_section(document, SectionKey::Server).map_err(LoadError::MandatorySection)?;
    let storage: StorageSettings =
        decode_section(document, SectionKey::Storage).map_err(LoadError::MandatorySection)?;

    let log = match decode_section::<LogSettings>(document, SectionKey::Log) {
        Ok(log) => log,
        Err(e) => {
            tracing::warn!(error = %e, "Optional log section skipped, using defaults");
            LogSettings::default()
        }
    };

    Ok(Settings {
        server: Arc::new(server),
        storage: Arc::new(storage),
        log: Arc::new(log),
    })
}

/// Decode every section for a reload on a running process.
///
/// Each section is decoded independently. A section that fails keeps its
/// value from `previous` and its key is returned in the failure list.
pub fn decode_over(
    document: &RawDocument,
    previous: &Settings,
) -> (Settings, Vec<(SectionKey, SectionError)>) {
    let mut failed = Vec::new();

    let server = retain_on_error(document, SectionKey::Server, &previous.server, &mut failed);
    let storage = retain_on_error(document, SectionKey::Storage, &previous.storage, &mut failed);
    let log = retain_on_error(document, SectionKey::Log, &previous.log, &mut failed);

    (Settings { server, storage, log }, failed)
}

fn retain_on_error<T>(
    document: &RawDocument,
    key: SectionKey,
    previous: &Arc<T>,
    failed: &mut Vec<(SectionKey, SectionError)>,
) -> Arc<T>
where
    T: serde::de::DeserializeOwned + PartialEq,
{
    match decode_section::<T>(document, key) {
        // Unchanged sections keep the previous allocation.
        Ok(value) if value == **previous => Arc::clone(previous),
        Ok(value) => Arc::new(value),
        Err(e) => {
            failed.push((key, e));
            Arc::clone(previous)
        }
    }
}
