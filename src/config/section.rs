//! Section decoding.
//!
//! Pulls one named top-level table out of the raw document and deserializes
//! it into its typed settings struct. Pure: no I/O, no logging.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::loader::RawDocument;

/// The sections the store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKey {
    Server,
    Storage,
    Log,
}

impl SectionKey {
    /// Every recognized section, in decode order.
    pub const ALL: [SectionKey; 3] = [SectionKey::Server, SectionKey::Storage, SectionKey::Log];

    /// Key of the table in the configuration document.
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKey::Server => "server",
            SectionKey::Storage => "storage",
            SectionKey::Log => "log",
        }
    }

    /// Mandatory sections must decode for startup to succeed.
    pub fn is_mandatory(&self) -> bool {
        matches!(self, SectionKey::Server | SectionKey::Storage)
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKey {
    type Err = SectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SectionKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| SectionError::Unknown(s.to_string()))
    }
}

/// Errors from decoding a single section.
#[derive(Debug, Error)]
pub enum SectionError {
    /// The section is absent from the document.
    #[error("section [{0}] is missing")]
    Missing(SectionKey),

    /// The key exists but holds a scalar or array instead of a table.
    #[error("section [{0}] is not a table")]
    NotATable(SectionKey),

    /// A field could not be converted to its declared type.
    #[error("section [{section}] is malformed: {source}")]
    Decode {
        section: SectionKey,
        #[source]
        source: toml::de::Error,
    },

    /// Lookup by a name that is not a known section.
    #[error("unknown section `{0}`")]
    Unknown(String),
}

impl SectionError {
    pub fn section(&self) -> Option<SectionKey> {
        match self {
            SectionError::Missing(key) | SectionError::NotATable(key) => Some(*key),
            SectionError::Decode { section, .. } => Some(*section),
            SectionError::Unknown(_) => None,
        }
    }
}

/// Decode the section stored under `key` into `T`.
pub fn decode_section<T: DeserializeOwned>(
    document: &RawDocument,
    key: SectionKey,
) -> Result<T, SectionError> {
    let value = document
        .get(key.as_str())
        .ok_or(SectionError::Missing(key))?;

    if !value.is_table() {
        return Err(SectionError::NotATable(key));
    }

    value
        .clone()
        .try_into::<T>()
        .map_err(|source| SectionError::Decode { section: key, source })
}
