//! Action executor: issues the storage operations for one [`SyncAction`].
//!
//! Every call ends in an [`OperationOutcome`]; store errors are recorded, never
//! propagated, so sibling actions are unaffected.
//!
//! ## Move protocol
//!
//! 1. Copy `prefix/from` to `prefix/to`.
//! 2. Only if the copy succeeded, delete `prefix/from`.
//!
//! A failed copy leaves the source intact and reports [`Stage::Copy`]. A failed
//! delete after a successful copy reports [`Stage::MoveCleanup`]: the object is
//! present at the destination and still present at the source.

use std::future::Future;
use std::sync::Arc;

use cosync_core::{remote_key, OperationOutcome, Stage, SyncAction, SyncConfig};

use crate::error::StoreError;
use crate::store::ObjectStore;

/// Runs [`SyncAction`]s against an [`ObjectStore`] under one key prefix.
pub struct Executor {
    store: Arc<dyn ObjectStore>,
    config: SyncConfig,
}

impl Executor {
    /// Executor writing through `store` with `config`.
    pub fn new(store: Arc<dyn ObjectStore>, config: SyncConfig) -> Self {
        Self { store, config }
    }

    /// Settings the executor was built with.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Object key for a repository-relative path.
    pub fn key(&self, path: &str) -> String {
        remote_key(&self.config.sub_path, path)
    }

    /// Execute one action. Never fails; failures are carried in the outcome.
    pub async fn execute(&self, action: SyncAction) -> OperationOutcome {
        let outcome = match &action {
            SyncAction::Upload { path } => match self.upload(path).await {
                Ok(()) => OperationOutcome::succeeded(action),
                Err(err) => OperationOutcome::failed(action, Stage::Upload, err.to_string()),
            },
            SyncAction::Delete { path } => {
                let key = self.key(path);
                match self.delete_idempotent(&key).await {
                    Ok(()) => OperationOutcome::succeeded(action),
                    Err(err) => OperationOutcome::failed(action, Stage::Delete, err.to_string()),
                }
            }
            SyncAction::Move { from, to } => self.move_object(from, to, action.clone()).await,
            SyncAction::Skip { .. } => OperationOutcome::succeeded(action),
        };

        log_outcome(&outcome);
        outcome
    }

    async fn upload(&self, path: &str) -> Result<(), StoreError> {
        let key = self.key(path);
        let local = self.config.root.join(path);
        let part_size = self.config.part_size;
        self.with_retry("upload", &key, || {
            self.store.put_file(&key, &local, part_size)
        })
        .await
    }

    /// Delete where an already-absent object counts as success.
    async fn delete_idempotent(&self, key: &str) -> Result<(), StoreError> {
        match self.with_retry("delete", key, || self.store.delete(key)).await {
            Err(StoreError::NotFound { .. }) => {
                tracing::debug!(key = %key, "object already absent");
                Ok(())
            }
            other => other,
        }
    }

    async fn move_object(&self, from: &str, to: &str, action: SyncAction) -> OperationOutcome {
        let from_key = self.key(from);
        let to_key = self.key(to);

        if let Err(err) = self
            .with_retry("copy", &from_key, || self.store.copy(&from_key, &to_key))
            .await
        {
            return OperationOutcome::failed(action, Stage::Copy, err.to_string());
        }

        match self.delete_idempotent(&from_key).await {
            Ok(()) => OperationOutcome::succeeded(action),
            Err(err) => OperationOutcome::failed(
                action,
                Stage::MoveCleanup,
                format!("copied to {to_key} but source was not removed: {err}"),
            ),
        }
    }

    /// Run `op` up to `max_attempts` times. Only transport errors are retried.
    async fn with_retry<F, Fut>(
        &self,
        name: &'static str,
        key: &str,
        op: F,
    ) -> Result<(), StoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<(), StoreError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(err @ StoreError::Transport { .. }) if attempt < self.config.max_attempts => {
                    tracing::debug!(
                        op = name,
                        key = %key,
                        attempt,
                        error = %err,
                        "retrying storage operation",
                    );
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                result => return result,
            }
        }
    }
}

fn log_outcome(outcome: &OperationOutcome) {
    let Some(action) = outcome.action.as_ref() else {
        return;
    };
    match &outcome.error {
        None if action.is_skip() => tracing::debug!(action = %action, "skipped"),
        None => tracing::info!(action = %action, "done"),
        Some(err) => tracing::warn!(
            action = %action,
            stage = %err.stage,
            error = %err.message,
            "failed",
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use cosync_core::SkipReason;
    use tempfile::TempDir;

    use super::*;
    use crate::memory::{MemoryStore, StoreCall, StoreOp};

    fn setup() -> (TempDir, Arc<MemoryStore>, Executor) {
        let root = TempDir::new().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let config = SyncConfig::new("docs").with_root(root.path());
        let executor = Executor::new(store.clone(), config);
        (root, store, executor)
    }

    #[tokio::test]
    async fn upload_writes_prefixed_key() {
        let (root, store, executor) = setup();
        fs::write(root.path().join("a.txt"), "hello").expect("write");

        let outcome = executor
            .execute(SyncAction::Upload {
                path: "a.txt".into(),
            })
            .await;

        assert!(outcome.success, "{outcome:?}");
        assert_eq!(store.object("docs/a.txt"), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn upload_of_missing_local_file_fails_at_upload_stage() {
        let (_root, store, executor) = setup();
        let outcome = executor
            .execute(SyncAction::Upload {
                path: "gone.txt".into(),
            })
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_ref().map(|e| e.stage), Some(Stage::Upload));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn large_upload_is_chunked() {
        let (root, store, executor) = setup();
        let part = executor.config().part_size as usize;
        fs::write(root.path().join("big.bin"), vec![0u8; part * 2 + 1]).expect("write");

        let outcome = executor
            .execute(SyncAction::Upload {
                path: "big.bin".into(),
            })
            .await;
        assert!(outcome.success);
        assert_eq!(
            store.calls(),
            vec![StoreCall::Put {
                key: "docs/big.bin".into(),
                parts: 3
            }]
        );
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_root, store, executor) = setup();
        store.insert("docs/old.txt", "x");
        let action = SyncAction::Delete {
            path: "old.txt".into(),
        };

        assert!(executor.execute(action.clone()).await.success);
        assert!(!store.contains("docs/old.txt"));
        assert!(executor.execute(action).await.success, "second delete must succeed");
    }

    #[tokio::test]
    async fn delete_transport_failure_is_recorded() {
        let (_root, store, executor) = setup();
        store.fail(StoreOp::Delete, "docs/x.txt");
        let outcome = executor
            .execute(SyncAction::Delete {
                path: "x.txt".into(),
            })
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_ref().map(|e| e.stage), Some(Stage::Delete));
    }

    #[tokio::test]
    async fn move_copies_then_deletes_source() {
        let (_root, store, executor) = setup();
        store.insert("docs/old.md", "body");

        let outcome = executor
            .execute(SyncAction::Move {
                from: "old.md".into(),
                to: "new.md".into(),
            })
            .await;

        assert!(outcome.success, "{outcome:?}");
        assert_eq!(store.object("docs/new.md"), Some(b"body".to_vec()));
        assert!(!store.contains("docs/old.md"));
        assert_eq!(
            store.calls(),
            vec![
                StoreCall::Copy {
                    from: "docs/old.md".into(),
                    to: "docs/new.md".into()
                },
                StoreCall::Delete {
                    key: "docs/old.md".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn failed_copy_never_deletes_source() {
        let (_root, store, executor) = setup();
        store.insert("docs/old.md", "body");
        store.fail(StoreOp::Copy, "docs/old.md");

        let outcome = executor
            .execute(SyncAction::Move {
                from: "old.md".into(),
                to: "new.md".into(),
            })
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_ref().map(|e| e.stage), Some(Stage::Copy));
        assert!(store.contains("docs/old.md"), "source must survive a failed copy");
        assert!(store
            .calls()
            .iter()
            .all(|c| !matches!(c, StoreCall::Delete { .. })));
    }

    #[tokio::test]
    async fn copy_of_missing_source_fails() {
        let (_root, _store, executor) = setup();
        let outcome = executor
            .execute(SyncAction::Move {
                from: "old.md".into(),
                to: "new.md".into(),
            })
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_ref().map(|e| e.stage), Some(Stage::Copy));
    }

    #[tokio::test]
    async fn failed_cleanup_reports_partial_move() {
        let (_root, store, executor) = setup();
        store.insert("docs/old.md", "body");
        store.fail(StoreOp::Delete, "docs/old.md");

        let outcome = executor
            .execute(SyncAction::Move {
                from: "old.md".into(),
                to: "new.md".into(),
            })
            .await;

        assert!(!outcome.success);
        assert!(outcome.is_partial_move());
        assert!(store.contains("docs/new.md"));
        assert!(store.contains("docs/old.md"));
    }

    #[tokio::test]
    async fn skip_issues_no_calls() {
        let (_root, store, executor) = setup();
        let outcome = executor
            .execute(SyncAction::Skip {
                path: "x.bin".into(),
                reason: SkipReason::Unsupported,
            })
            .await;
        assert!(outcome.success);
        assert!(outcome.is_skip());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn transport_errors_are_retried_up_to_max_attempts() {
        let root = TempDir::new().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        store.insert("docs/a.txt", "x");
        store.fail_times(StoreOp::Delete, "docs/a.txt", 2);
        let config = SyncConfig::new("docs")
            .with_root(root.path())
            .with_retries(3, Duration::ZERO);
        let executor = Executor::new(store.clone(), config);

        let outcome = executor
            .execute(SyncAction::Delete {
                path: "a.txt".into(),
            })
            .await;
        assert!(outcome.success, "{outcome:?}");
        assert!(!store.contains("docs/a.txt"));
    }

    #[tokio::test]
    async fn single_attempt_by_default() {
        let (_root, store, executor) = setup();
        store.insert("docs/a.txt", "x");
        store.fail_times(StoreOp::Delete, "docs/a.txt", 1);
        let outcome = executor
            .execute(SyncAction::Delete {
                path: "a.txt".into(),
            })
            .await;
        assert!(!outcome.success);
        assert!(store.contains("docs/a.txt"));
    }
}
