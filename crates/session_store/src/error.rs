use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to create registry key\nHKEY_CURRENT_USER\\{path}")]
    RegistryKeyCreate { path: String },

    #[error("registry key does not exist: HKEY_CURRENT_USER\\{path}")]
    RegistryKeyMissing { path: String },

    #[error("registry key segment '{segment}' is {len} bytes; the limit is {max}")]
    KeySegmentTooLong {
        segment: String,
        len: usize,
        max: usize,
    },

    #[error("registry key path would exceed {max} bytes")]
    KeyPathTooLong { max: usize },

    #[error("registry key segment must not be empty or contain '\\': {segment:?}")]
    InvalidKeySegment { segment: String },

    #[error("failed to parse registry hive {path}: {source}")]
    HiveParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize registry hive for {path}: {source}")]
    HiveSerialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn key_create(path: impl std::fmt::Display) -> Self {
        Self::RegistryKeyCreate {
            path: path.to_string(),
        }
    }

    #[must_use]
    pub fn hive_parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::HiveParse {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn hive_serialize(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::HiveSerialize {
            path: path.into(),
            source,
        }
    }

    /// True when the underlying failure is a missing file or directory.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Failures of the recent-session list transform.
#[derive(Debug, Error)]
pub enum RecentListError {
    #[error("unable to open or create the jump list key: {0}")]
    KeyOpenCreate(#[source] StoreError),

    #[error("unable to read the recent sessions value: {0}")]
    ValueRead(#[source] StoreError),

    #[error("unable to write the recent sessions value: {0}")]
    ValueWrite(#[source] StoreError),
}
