//! Change classifier: maps a [`ChangeRecord`] onto a [`SyncAction`].
//!
//! | kind       | action                          |
//! |------------|---------------------------------|
//! | `Added`    | `Upload { path }`               |
//! | `Modified` | `Upload { path }`               |
//! | `Removed`  | `Delete { path }`               |
//! | `Renamed`  | `Move { from: previous, to }`   |
//! | `Other`    | `Skip { path, Unsupported }`    |

use cosync_core::{ChangeKind, ChangeRecord, CoreError, SkipReason, SyncAction};

/// Classify a single record. Pure; equal input gives equal output.
///
/// Fails with [`CoreError::InvalidRecord`] when the path is empty or a rename
/// carries no previous path.
pub fn classify(record: &ChangeRecord) -> Result<SyncAction, CoreError> {
    if record.path.is_empty() {
        return Err(CoreError::invalid_record(&record.path, "empty path"));
    }

    let path = record.path.clone();
    let action = match &record.kind {
        ChangeKind::Added | ChangeKind::Modified => SyncAction::Upload { path },
        ChangeKind::Removed => SyncAction::Delete { path },
        ChangeKind::Renamed => match record.previous_path.as_deref() {
            Some(from) if !from.is_empty() => SyncAction::Move {
                from: from.to_owned(),
                to: path,
            },
            _ => {
                return Err(CoreError::invalid_record(
                    &record.path,
                    "renamed record has no previous path",
                ))
            }
        },
        ChangeKind::Other(_) => SyncAction::Skip {
            path,
            reason: SkipReason::Unsupported,
        },
    };
    Ok(action)
}
