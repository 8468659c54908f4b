//! Object store abstraction used by the executor.
//!
//! Implementations are shared as `Arc<dyn ObjectStore>` across every action
//! of a batch, so all methods take `&self`.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StoreError;

/// Storage primitives the executor needs from a bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write the contents of `local_path` to `key`.
    ///
    /// Bodies larger than `part_size` must be sent in chunks of at most
    /// `part_size` bytes.
    async fn put_file(&self, key: &str, local_path: &Path, part_size: u64)
        -> Result<(), StoreError>;

    /// Remove `key`. Returns [`StoreError::NotFound`] when the store reports
    /// the object as absent.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Server-side copy of `from_key` to `to_key`.
    async fn copy(&self, from_key: &str, to_key: &str) -> Result<(), StoreError>;
}
