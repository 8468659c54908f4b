//! Error types for cosync-core.

use thiserror::Error;

/// Errors raised while interpreting upstream change records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The change-set collaborator produced a record that breaks its contract
    /// (empty path, or a rename without a previous path).
    #[error("invalid change record for '{path}': {reason}")]
    InvalidRecord { path: String, reason: String },
}

impl CoreError {
    /// Convenience constructor for [`CoreError::InvalidRecord`].
    pub fn invalid_record(path: &str, reason: impl Into<String>) -> Self {
        CoreError::InvalidRecord {
            path: path.to_owned(),
            reason: reason.into(),
        }
    }
}
