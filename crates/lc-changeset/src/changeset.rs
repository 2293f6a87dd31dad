// changeset.rs — the ordered, checksummed list of FileChanges a plan proposes.
//
// A ChangeSet's checksum is verified twice downstream (once by WriteGate,
// once by Executor immediately before applying) — any mutation after
// construction invalidates it, so ChangeSet deliberately exposes no
// mutating methods once built.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::ChangesetError;
use crate::file_change::FileChange;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSet {
    pub changeset_id: Uuid,
    pub file_changes: Vec<FileChange>,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

impl ChangeSet {
    /// Build a new ChangeSet, computing its checksum from the canonical
    /// serialization of `file_changes`. Rejects an empty change list and
    /// any path touched more than once (ambiguous apply order otherwise).
    pub fn new(file_changes: Vec<FileChange>) -> Result<Self, ChangesetError> {
        if file_changes.is_empty() {
            return Err(ChangesetError::Empty);
        }
        let mut seen = HashSet::new();
        for fc in &file_changes {
            if !seen.insert(fc.path().as_str().to_string()) {
                return Err(ChangesetError::DuplicatePath {
                    path: fc.path().as_str().to_string(),
                });
            }
        }
        let checksum = compute_checksum(&file_changes);
        Ok(Self {
            changeset_id: Uuid::new_v4(),
            file_changes,
            checksum,
            created_at: Utc::now(),
        })
    }

    /// Re-derive the checksum from the current `file_changes` and compare
    /// against the stored `checksum`. Used by WriteGate (decision time)
    /// and Executor (apply time) as the two integrity checkpoints.
    pub fn verify_checksum(&self) -> bool {
        self.checksum == compute_checksum(&self.file_changes)
    }

    pub fn affected_paths(&self) -> Vec<String> {
        self.file_changes
            .iter()
            .map(|fc| fc.path().as_str().to_string())
            .collect()
    }
}

/// Canonical serialization order is the order given in `file_changes` — the
/// ChangeSet is already canonical (callers choose apply order when they
/// build it), so the checksum commits to that order directly rather than
/// re-sorting.
fn compute_checksum(file_changes: &[FileChange]) -> String {
    let json = serde_json::to_string(file_changes).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}
