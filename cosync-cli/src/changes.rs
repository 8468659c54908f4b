//! Local inputs: change-set files and the ignore file.

use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use cosync_core::ChangeRecord;
use cosync_sync::IgnoreFilter;

use crate::github::{CommitFile, CommitResponse};

/// Accepted shapes of a `--changes` file: a bare array of commit files, or a
/// saved commit response.
#[derive(Deserialize)]
#[serde(untagged)]
enum ChangesDocument {
    Files(Vec<CommitFile>),
    Commit(CommitResponse),
}

/// Read a change-set from a JSON file on disk.
pub fn load_changes_file(path: &Path) -> Result<Vec<ChangeRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read changes file {}", path.display()))?;
    parse_changes(&raw).with_context(|| format!("invalid changes file {}", path.display()))
}

/// Parse a change-set document from JSON text.
pub fn parse_changes(raw: &str) -> Result<Vec<ChangeRecord>> {
    let files = match serde_json::from_str(raw)? {
        ChangesDocument::Files(files) => files,
        ChangesDocument::Commit(commit) => commit.into_files()?,
    };
    Ok(files.into_iter().map(ChangeRecord::from).collect())
}

/// Compile the ignore file at `path`.
///
/// A missing or unreadable file yields an empty filter; lines that are not
/// valid patterns are logged and skipped.
pub fn load_ignore_filter(path: &Path) -> IgnoreFilter {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no ignore file");
            return IgnoreFilter::empty();
        }
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "ignore file unreadable, filtering nothing"
            );
            return IgnoreFilter::empty();
        }
    };

    let (filter, errors) = IgnoreFilter::parse(&content);
    for err in &errors {
        tracing::warn!(path = %path.display(), error = %err, "skipping ignore pattern");
    }
    tracing::debug!(path = %path.display(), patterns = filter.len(), "loaded ignore file");
    filter
}
