//! Error types for cosync-sync.

use std::path::PathBuf;

use thiserror::Error;

/// A single ignore line that could not be compiled.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("ignore pattern on line {line} is not a valid regex ({pattern:?}): {source}")]
    Compile {
        line: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// All errors an [`ObjectStore`](crate::ObjectStore) can report.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store has no object under `key`.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// Reading the local file body failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any failure reported by the storage transport.
    #[error("{op} failed for {key}: {message}")]
    Transport {
        op: &'static str,
        key: String,
        message: String,
    },

    /// Settings or arguments the client cannot work with.
    #[error("invalid store input: {0}")]
    InvalidInput(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`StoreError::Transport`].
pub(crate) fn transport_err(
    op: &'static str,
    key: &str,
    message: impl Into<String>,
) -> StoreError {
    StoreError::Transport {
        op,
        key: key.to_owned(),
        message: message.into(),
    }
}
