//! Create / update / skip decisions for rendered documents.
//!
//! Two documents are considered equal when they match after line endings are
//! unified, trailing whitespace at the end is dropped and the front matter
//! `updated:` stamp is ignored. The stamp therefore only moves when something
//! else in the document changed.

use crate::error::StoreError;
use crate::store::DocumentStore;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Create,
    Update,
    Skip,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Create => "created",
            SyncAction::Update => "updated",
            SyncAction::Skip => "skipped",
        }
    }
}

const UPDATED_KEY: &str = "updated:";

/// Canonical form used for comparison.
pub fn normalize_for_compare(content: &str) -> String {
    let unified = content.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed = unified.trim_end();

    let mut lines: Vec<&str> = Vec::new();
    let mut in_front_matter = false;
    for (i, line) in trimmed.split('\n').enumerate() {
        if line == "---" {
            if i == 0 {
                in_front_matter = true;
            } else if in_front_matter {
                in_front_matter = false;
            }
        } else if in_front_matter && line.starts_with(UPDATED_KEY) {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n")
}

pub fn decide(existing: Option<&str>, rendered: &str) -> SyncAction {
    match existing {
        None => SyncAction::Create,
        Some(current) if normalize_for_compare(current) == normalize_for_compare(rendered) => {
            SyncAction::Skip
        }
        Some(_) => SyncAction::Update,
    }
}

/// Decides what `path` needs and, unless `dry_run`, writes `rendered` to the store.
pub fn apply<S: DocumentStore + ?Sized>(
    store: &mut S,
    path: &str,
    rendered: &str,
    dry_run: bool,
) -> Result<SyncAction, StoreError> {
    let existing = store.read(path)?;
    let action = decide(existing.as_deref(), rendered);

    match action {
        SyncAction::Skip => {
            debug!(target_path = %path, "Document unchanged");
        }
        SyncAction::Create | SyncAction::Update if dry_run => {
            info!(target_path = %path, action = action.as_str(), "Dry run, not writing");
        }
        SyncAction::Create | SyncAction::Update => {
            store.write(path, rendered)?;
            info!(target_path = %path, action = action.as_str(), "Document written");
        }
    }

    Ok(action)
}
