//! # cosync-sync
//!
//! Change-set to object-store synchronisation engine.
//!
//! The pass runs filter → classify → execute: [`filter::IgnoreFilter`] drops
//! ignored paths, [`classify::classify`] turns each record into a
//! [`SyncAction`](cosync_core::SyncAction), and [`executor::Executor`] issues
//! the storage operations. [`pipeline::run`] drives all three and returns a
//! [`BatchReport`](cosync_core::BatchReport).

pub mod classify;
pub mod error;
pub mod executor;
pub mod filter;
pub mod memory;
pub mod pipeline;
pub mod s3;
pub mod store;

pub use classify::classify;
pub use error::{FilterError, StoreError};
pub use executor::Executor;
pub use filter::IgnoreFilter;
pub use memory::MemoryStore;
pub use pipeline::{plan, run, run_with_filter, PlannedRecord};
pub use s3::{S3Store, StoreSettings};
pub use store::ObjectStore;
