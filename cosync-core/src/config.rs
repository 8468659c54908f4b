//! Run configuration shared by the executor and the orchestrator.

use std::path::PathBuf;
use std::time::Duration;

/// Default multipart chunk size (5 MiB, also the S3 minimum part size).
pub const DEFAULT_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Settings for a single synchronisation pass.
///
/// Built once by the caller and handed to the executor; nothing in the sync
/// engine reads process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Destination key prefix inside the bucket.
    pub sub_path: String,
    /// Local working-tree root that change paths are relative to.
    pub root: PathBuf,
    /// Chunk size for multipart uploads.
    pub part_size: u64,
    /// Attempts per storage operation. `1` means no retry.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Cap on concurrently dispatched actions; `None` leaves it to the store client.
    pub max_in_flight: Option<usize>,
}

impl SyncConfig {
    pub fn new(sub_path: impl Into<String>) -> Self {
        Self {
            sub_path: sub_path.into(),
            ..Self::default()
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Part sizes below [`DEFAULT_PART_SIZE`] are raised to it.
    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size.max(DEFAULT_PART_SIZE);
        self
    }

    /// Zero is treated as a single attempt.
    pub fn with_retries(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_max_in_flight(mut self, limit: Option<usize>) -> Self {
        self.max_in_flight = limit.filter(|n| *n > 0);
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sub_path: String::new(),
            root: PathBuf::from("."),
            part_size: DEFAULT_PART_SIZE,
            max_attempts: 1,
            retry_delay: Duration::from_millis(500),
            max_in_flight: None,
        }
    }
}
