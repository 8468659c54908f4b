//! Sync orchestrator: filter → classify → dispatch → aggregate.
//!
//! Each accepted action runs as its own task; the orchestrator does not wait
//! for one action before dispatching the next. Outcomes are joined in dispatch
//! order, so the report order only depends on the input order.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use cosync_core::{BatchReport, ChangeRecord, OperationOutcome, SkipReason, Stage, SyncAction};

use crate::classify::classify;
use crate::executor::Executor;
use crate::filter::IgnoreFilter;

/// What the pass decided for one record before any storage call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedRecord {
    /// Needs the executor.
    Dispatch(SyncAction),
    /// Already final: ignored by the filter, or rejected by the classifier.
    Settled(OperationOutcome),
}

impl PlannedRecord {
    /// Path of the record this plan entry came from.
    pub fn path(&self) -> &str {
        match self {
            PlannedRecord::Dispatch(action) => action.path(),
            PlannedRecord::Settled(outcome) => &outcome.path,
        }
    }
}

/// Filter and classify every record. Pure; issues no storage calls.
pub fn plan(records: &[ChangeRecord], filter: &IgnoreFilter) -> Vec<PlannedRecord> {
    records
        .iter()
        .map(|record| {
            if let Some(pattern) = filter.matching_pattern(&record.path) {
                tracing::debug!(path = %record.path, pattern, "ignored");
                return PlannedRecord::Settled(OperationOutcome::succeeded(SyncAction::Skip {
                    path: record.path.clone(),
                    reason: SkipReason::Ignored,
                }));
            }
            match classify(record) {
                Ok(action) => {
                    tracing::debug!(
                        path = %record.path,
                        status = %record.kind,
                        action = %action,
                        "planned"
                    );
                    PlannedRecord::Dispatch(action)
                }
                Err(err) => {
                    tracing::warn!(path = %record.path, error = %err, "rejected change record");
                    PlannedRecord::Settled(OperationOutcome::unclassified(
                        record.path.clone(),
                        err.to_string(),
                    ))
                }
            }
        })
        .collect()
}

/// Run a full pass over `records`, compiling `ignore_lines` first.
///
/// Ignore lines that fail to compile are logged and skipped.
pub async fn run<I, S>(
    records: &[ChangeRecord],
    ignore_lines: I,
    executor: Arc<Executor>,
) -> BatchReport
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let (filter, errors) = IgnoreFilter::compile(ignore_lines);
    for err in &errors {
        tracing::warn!(error = %err, "skipping ignore pattern");
    }
    run_with_filter(records, &filter, executor).await
}

/// Run a full pass with an already compiled filter.
pub async fn run_with_filter(
    records: &[ChangeRecord],
    filter: &IgnoreFilter,
    executor: Arc<Executor>,
) -> BatchReport {
    let started_at = Utc::now();
    let planned = plan(records, filter);
    let limit = executor
        .config()
        .max_in_flight
        .map(|n| Arc::new(Semaphore::new(n)));

    let slots: Vec<Slot> = planned
        .into_iter()
        .map(|entry| match entry {
            PlannedRecord::Settled(outcome) => Slot::Settled(outcome),
            PlannedRecord::Dispatch(action) => {
                let handle = spawn_action(action.clone(), executor.clone(), limit.clone());
                Slot::Running { action, handle }
            }
        })
        .collect();

    let mut outcomes = Vec::with_capacity(slots.len());
    for slot in slots {
        let outcome = match slot {
            Slot::Settled(outcome) => outcome,
            Slot::Running { action, handle } => match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!(action = %action, error = %err, "action task did not complete");
                    OperationOutcome::failed(action, Stage::Dispatch, err.to_string())
                }
            },
        };
        outcomes.push(outcome);
    }

    let report = BatchReport::new(started_at, outcomes);
    tracing::info!(
        total = report.len(),
        succeeded = report.succeeded().count(),
        skipped = report.skipped().count(),
        failed = report.failed().count(),
        "sync pass finished",
    );
    report
}

enum Slot {
    Settled(OperationOutcome),
    Running {
        action: SyncAction,
        handle: JoinHandle<OperationOutcome>,
    },
}

fn spawn_action(
    action: SyncAction,
    executor: Arc<Executor>,
    limit: Option<Arc<Semaphore>>,
) -> JoinHandle<OperationOutcome> {
    tokio::spawn(async move {
        // Held until the action finishes; `None` when unbounded.
        let _permit = match limit {
            Some(semaphore) => semaphore.acquire_owned().await.ok(),
            None => None,
        };
        executor.execute(action).await
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cosync_core::{ChangeKind, SyncConfig};
    use tokio::time::Instant;

    use super::*;
    use crate::memory::{MemoryStore, StoreCall, StoreOp};

    fn removed(path: &str) -> ChangeRecord {
        ChangeRecord::new(path, ChangeKind::Removed)
    }

    fn executor(store: Arc<MemoryStore>, config: SyncConfig) -> Arc<Executor> {
        Arc::new(Executor::new(store, config))
    }

    #[test]
    fn plan_settles_ignored_and_invalid_records() {
        let (filter, _) = IgnoreFilter::compile(["^secrets/"]);
        let records = vec![
            ChangeRecord::new("secrets/key.pem", ChangeKind::Added),
            ChangeRecord::new("new.md", ChangeKind::Renamed),
            ChangeRecord::new("a.txt", ChangeKind::Modified),
        ];

        let planned = plan(&records, &filter);
        assert_eq!(planned.len(), 3);
        assert!(matches!(
            &planned[0],
            PlannedRecord::Settled(o) if o.success && o.is_skip()
        ));
        assert!(matches!(
            &planned[1],
            PlannedRecord::Settled(o) if !o.success && o.action.is_none()
        ));
        assert_eq!(
            planned[2],
            PlannedRecord::Dispatch(SyncAction::Upload {
                path: "a.txt".into()
            })
        );
    }

    #[test]
    fn ignore_check_uses_current_path_of_renames() {
        let (filter, _) = IgnoreFilter::compile(["^drafts/"]);
        let records = vec![ChangeRecord::renamed("drafts/post.md", "posts/post.md")];
        let planned = plan(&records, &filter);
        assert!(matches!(planned[0], PlannedRecord::Dispatch(SyncAction::Move { .. })));
    }

    #[tokio::test]
    async fn report_follows_dispatch_order_not_completion_order() {
        let store = Arc::new(MemoryStore::new());
        for key in ["p/slow", "p/fast"] {
            store.insert(key, "x");
        }
        store.delay("p/slow", Duration::from_millis(50));

        let records = vec![removed("slow"), removed("fast")];
        let report = run(
            &records,
            Vec::<String>::new(),
            executor(store.clone(), SyncConfig::new("p")),
        )
        .await;

        let paths: Vec<_> = report.outcomes.iter().map(|o| o.path.as_str()).collect();
        assert_eq!(paths, vec!["slow", "fast"]);
        assert_eq!(
            store.calls(),
            vec![
                StoreCall::Delete { key: "p/fast".into() },
                StoreCall::Delete { key: "p/slow".into() },
            ],
            "fast action must not wait for the slow one"
        );
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn actions_run_concurrently() {
        let store = Arc::new(MemoryStore::new());
        for (key, secs) in [("p/a", 3), ("p/b", 4), ("p/c", 5)] {
            store.insert(key, "x");
            store.delay(key, Duration::from_secs(secs));
        }
        let records = vec![removed("a"), removed("b"), removed("c")];

        let started = Instant::now();
        let report = run(
            &records,
            Vec::<String>::new(),
            executor(store, SyncConfig::new("p")),
        )
        .await;
        let elapsed = started.elapsed();

        assert!(report.is_success());
        assert!(elapsed < Duration::from_secs(12), "ran sequentially: {elapsed:?}");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn max_in_flight_bounds_concurrency() {
        let store = Arc::new(MemoryStore::new());
        for key in ["p/a", "p/b"] {
            store.insert(key, "x");
            store.delay(key, Duration::from_secs(5));
        }
        let records = vec![removed("a"), removed("b")];
        let config = SyncConfig::new("p").with_max_in_flight(Some(1));

        let started = Instant::now();
        let report = run(&records, Vec::<String>::new(), executor(store, config)).await;

        assert!(report.is_success());
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_siblings() {
        let store = Arc::new(MemoryStore::new());
        for key in ["p/a", "p/b", "p/c", "p/d"] {
            store.insert(key, "x");
        }
        store.fail(StoreOp::Delete, "p/b");
        let records = vec![removed("a"), removed("b"), removed("c"), removed("d")];

        let report = run(
            &records,
            Vec::<String>::new(),
            executor(store.clone(), SyncConfig::new("p")),
        )
        .await;

        assert_eq!(report.len(), 4);
        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.outcomes[1].path, "b");
        assert_eq!(store.keys(), vec!["p/b".to_string()]);
    }

    #[tokio::test]
    async fn malformed_ignore_line_does_not_abort() {
        let store = Arc::new(MemoryStore::new());
        store.insert("p/tmp/x", "x");
        store.insert("p/keep", "x");
        let records = vec![removed("tmp/x"), removed("keep")];

        let report = run(
            &records,
            ["(unclosed", "^tmp/"],
            executor(store.clone(), SyncConfig::new("p")),
        )
        .await;

        assert!(report.is_success());
        assert_eq!(report.skipped().count(), 1);
        assert!(store.contains("p/tmp/x"));
        assert!(!store.contains("p/keep"));
    }

    #[tokio::test]
    async fn empty_changeset_yields_empty_report() {
        let store = Arc::new(MemoryStore::new());
        let report = run(&[], Vec::<String>::new(), executor(store, SyncConfig::new("p"))).await;
        assert!(report.is_empty());
        assert!(report.is_success());
    }
}
