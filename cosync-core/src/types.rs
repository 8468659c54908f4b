//! Domain types for a change-set synchronisation pass.
//!
//! Records come in from the revision-history collaborator, are turned into
//! [`SyncAction`]s, and every action ends as exactly one [`OperationOutcome`]
//! inside the [`BatchReport`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Change records
// ---------------------------------------------------------------------------

/// How a file changed between the two revisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// The file did not exist in the earlier revision.
    Added,
    /// The file's contents changed in place.
    Modified,
    /// The file no longer exists.
    Removed,
    /// The file moved from `previous_path` to `path`.
    Renamed,
    /// Any status the engine does not act on (`unmerged`, `copied`, ...).
    /// The raw status string is kept for reporting.
    Other(String),
}

impl ChangeKind {
    /// Map a revision-history status string onto a change kind.
    pub fn from_status(status: &str) -> Self {
        match status {
            "added" => ChangeKind::Added,
            "modified" => ChangeKind::Modified,
            "removed" => ChangeKind::Removed,
            "renamed" => ChangeKind::Renamed,
            other => ChangeKind::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Removed => write!(f, "removed"),
            ChangeKind::Renamed => write!(f, "renamed"),
            ChangeKind::Other(status) => write!(f, "{status}"),
        }
    }
}

/// One file touched between two revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Current repository-relative path.
    pub path: String,
    /// Prior path; only meaningful for [`ChangeKind::Renamed`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
    /// How the file changed.
    pub kind: ChangeKind,
}

impl ChangeRecord {
    /// A record with no previous path.
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            previous_path: None,
            kind,
        }
    }

    /// A rename from `previous_path` to `path`.
    pub fn renamed(previous_path: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            previous_path: Some(previous_path.into()),
            kind: ChangeKind::Renamed,
        }
    }

    /// Build a record from the raw `{path, status, previous_path}` triple.
    pub fn from_status(
        path: impl Into<String>,
        status: &str,
        previous_path: Option<String>,
    ) -> Self {
        Self {
            path: path.into(),
            previous_path,
            kind: ChangeKind::from_status(status),
        }
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Why no storage operation was issued for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipReason {
    /// The path matched an ignore pattern.
    Ignored,
    /// The change kind is not one the engine acts on.
    Unsupported,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Ignored => write!(f, "ignored"),
            SkipReason::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// The storage-level decision for a single change record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum SyncAction {
    /// (Re)write the object at `prefix/path`.
    Upload { path: String },
    /// Remove the object at `prefix/path`.
    Delete { path: String },
    /// Copy `prefix/from` to `prefix/to`, then remove `prefix/from`.
    Move { from: String, to: String },
    /// Issue nothing.
    Skip { path: String, reason: SkipReason },
}

impl SyncAction {
    /// The path the action is reported under (the destination for moves).
    pub fn path(&self) -> &str {
        match self {
            SyncAction::Upload { path }
            | SyncAction::Delete { path }
            | SyncAction::Skip { path, .. } => path,
            SyncAction::Move { to, .. } => to,
        }
    }

    /// Lowercase action name, as used in reports.
    pub fn name(&self) -> &'static str {
        match self {
            SyncAction::Upload { .. } => "upload",
            SyncAction::Delete { .. } => "delete",
            SyncAction::Move { .. } => "move",
            SyncAction::Skip { .. } => "skip",
        }
    }

    /// `true` for [`SyncAction::Skip`].
    pub fn is_skip(&self) -> bool {
        matches!(self, SyncAction::Skip { .. })
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::Upload { path } => write!(f, "upload {path}"),
            SyncAction::Delete { path } => write!(f, "delete {path}"),
            SyncAction::Move { from, to } => write!(f, "move {from} -> {to}"),
            SyncAction::Skip { path, reason } => write!(f, "skip {path} ({reason})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Where in the processing of a record a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// The record could not be turned into an action.
    Classify,
    /// Writing the object failed.
    Upload,
    /// Removing the object failed.
    Delete,
    /// First half of a move; the source object is untouched.
    Copy,
    /// Second half of a move; the destination object exists but the source
    /// object was not removed.
    MoveCleanup,
    /// The unit of work running the action did not complete.
    Dispatch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Classify => "classify",
            Stage::Upload => "upload",
            Stage::Delete => "delete",
            Stage::Copy => "copy",
            Stage::MoveCleanup => "move_cleanup",
            Stage::Dispatch => "dispatch",
        };
        f.write_str(s)
    }
}

/// Why an outcome failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeError {
    /// Where the failure happened.
    pub stage: Stage,
    /// Human-readable failure description.
    pub message: String,
}

/// Result of processing one change record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    /// Path of the originating record.
    pub path: String,
    /// `None` only when the record could not be classified.
    pub action: Option<SyncAction>,
    /// Whether the action completed; skips count as successful.
    pub success: bool,
    /// Present exactly when `success` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
}

impl OperationOutcome {
    /// A completed action.
    pub fn succeeded(action: SyncAction) -> Self {
        Self {
            path: action.path().to_owned(),
            action: Some(action),
            success: true,
            error: None,
        }
    }

    /// An action that failed at `stage`.
    pub fn failed(action: SyncAction, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            path: action.path().to_owned(),
            action: Some(action),
            success: false,
            error: Some(OutcomeError {
                stage,
                message: message.into(),
            }),
        }
    }

    /// Outcome for a record that never became an action.
    pub fn unclassified(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            action: None,
            success: false,
            error: Some(OutcomeError {
                stage: Stage::Classify,
                message: message.into(),
            }),
        }
    }

    /// The failure message, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    /// `true` when the action was a skip.
    pub fn is_skip(&self) -> bool {
        self.action.as_ref().is_some_and(SyncAction::is_skip)
    }

    /// A move whose copy landed but whose source removal failed.
    pub fn is_partial_move(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|e| e.stage == Stage::MoveCleanup)
    }
}

/// Aggregated outcomes of one pass, in dispatch order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// When the pass began.
    pub started_at: DateTime<Utc>,
    /// When the last outcome was collected.
    pub finished_at: DateTime<Utc>,
    /// One entry per input record, in input order.
    pub outcomes: Vec<OperationOutcome>,
}

impl BatchReport {
    /// Close a pass that began at `started_at`; `finished_at` is now.
    pub fn new(started_at: DateTime<Utc>, outcomes: Vec<OperationOutcome>) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            outcomes,
        }
    }

    /// Number of outcomes.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// `true` when the pass had no records.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Successful outcomes that issued a storage operation.
    pub fn succeeded(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|o| o.success && !o.is_skip())
    }

    pub fn failed(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|o| o.is_skip())
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
