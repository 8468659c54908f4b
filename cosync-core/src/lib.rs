//! cosync core library — change-set domain types, remote keys, config, errors.
//!
//! Public API surface:
//! - [`types`] — change records, sync actions, outcomes and the batch report
//! - [`key`] — remote key derivation
//! - [`config`] — [`SyncConfig`]
//! - [`error`] — [`CoreError`]

pub mod config;
pub mod error;
pub mod key;
pub mod types;

pub use config::SyncConfig;
pub use error::CoreError;
pub use key::remote_key;
pub use types::{
    BatchReport, ChangeKind, ChangeRecord, OperationOutcome, OutcomeError, SkipReason, Stage,
    SyncAction,
};
