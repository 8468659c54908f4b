//! In-process [`ObjectStore`] used as a fake in tests and dry embeddings.
//!
//! Objects live in a sorted map. Every completed call is appended to a call
//! log (in completion order), and failures or latency can be injected per
//! operation and key.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{io_err, transport_err, StoreError};
use crate::store::ObjectStore;

/// Storage primitive, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// [`ObjectStore::put_file`].
    Put,
    /// [`ObjectStore::delete`].
    Delete,
    /// [`ObjectStore::copy`], matched on the source key.
    Copy,
}

/// A call the store saw, recorded once it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// An upload, with the number of chunks it was sent in.
    Put { key: String, parts: u64 },
    /// A removal; recorded whether or not the key existed.
    Delete { key: String },
    /// A server-side copy.
    Copy { from: String, to: String },
}

/// Thread-safe in-memory bucket.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    calls: Mutex<Vec<StoreCall>>,
    // Remaining injected failures per (op, key); `None` fails forever.
    failures: Mutex<HashMap<(StoreOp, String), Option<u32>>>,
    latency: Mutex<HashMap<String, Duration>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    /// An empty bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly, bypassing the call log.
    pub fn insert(&self, key: impl Into<String>, body: impl Into<Vec<u8>>) {
        lock(&self.objects).insert(key.into(), body.into());
    }

    /// Body stored under `key`.
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.objects).get(key).cloned()
    }

    /// `true` when `key` holds an object.
    pub fn contains(&self, key: &str) -> bool {
        lock(&self.objects).contains_key(key)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    /// Completed calls, in completion order.
    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.calls).clone()
    }

    /// Make every `op` on `key` fail with a transport error.
    ///
    /// Copies are matched on their source key.
    pub fn fail(&self, op: StoreOp, key: impl Into<String>) {
        lock(&self.failures).insert((op, key.into()), None);
    }

    /// Make the next `times` calls of `op` on `key` fail, then succeed.
    pub fn fail_times(&self, op: StoreOp, key: impl Into<String>, times: u32) {
        lock(&self.failures).insert((op, key.into()), Some(times));
    }

    /// Delay every operation touching `key` (the destination key for copies).
    pub fn delay(&self, key: impl Into<String>, latency: Duration) {
        lock(&self.latency).insert(key.into(), latency);
    }

    fn injected_failure(&self, op: StoreOp, key: &str) -> Option<StoreError> {
        let mut failures = lock(&self.failures);
        let entry = failures.get_mut(&(op, key.to_owned()))?;
        match entry {
            None => {}
            Some(0) => return None,
            Some(n) => *n -= 1,
        }
        let name = match op {
            StoreOp::Put => "put",
            StoreOp::Delete => "delete",
            StoreOp::Copy => "copy",
        };
        Some(transport_err(name, key, "injected failure"))
    }

    async fn simulate_latency(&self, key: &str) {
        let latency = lock(&self.latency).get(key).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn record(&self, call: StoreCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_file(
        &self,
        key: &str,
        local_path: &Path,
        part_size: u64,
    ) -> Result<(), StoreError> {
        self.simulate_latency(key).await;
        if let Some(err) = self.injected_failure(StoreOp::Put, key) {
            return Err(err);
        }
        let body = tokio::fs::read(local_path)
            .await
            .map_err(|e| io_err(local_path, e))?;
        let parts = (body.len() as u64).div_ceil(part_size.max(1)).max(1);
        lock(&self.objects).insert(key.to_owned(), body);
        self.record(StoreCall::Put {
            key: key.to_owned(),
            parts,
        });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.simulate_latency(key).await;
        if let Some(err) = self.injected_failure(StoreOp::Delete, key) {
            return Err(err);
        }
        let removed = lock(&self.objects).remove(key);
        self.record(StoreCall::Delete {
            key: key.to_owned(),
        });
        match removed {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                key: key.to_owned(),
            }),
        }
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> Result<(), StoreError> {
        self.simulate_latency(to_key).await;
        if let Some(err) = self.injected_failure(StoreOp::Copy, from_key) {
            return Err(err);
        }
        let result = {
            let mut objects = lock(&self.objects);
            match objects.get(from_key).cloned() {
                Some(body) => {
                    objects.insert(to_key.to_owned(), body);
                    Ok(())
                }
                None => Err(StoreError::NotFound {
                    key: from_key.to_owned(),
                }),
            }
        };
        self.record(StoreCall::Copy {
            from: from_key.to_owned(),
            to: to_key.to_owned(),
        });
        result
    }
}
