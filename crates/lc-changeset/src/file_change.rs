// file_change.rs — the three operations a ChangeSet may perform on a path.

use lc_core::path::RelPath;
use serde::{Deserialize, Serialize};

/// One of CREATE / UPDATE / DELETE on one workspace-relative path.
///
/// `#[serde(tag = "op", rename_all = "snake_case")]` matches the tagged-enum
/// convention used throughout the corpus for wire-visible variant unions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FileChange {
    Create {
        path: RelPath,
        new_content: String,
        new_hash: String,
    },
    Update {
        path: RelPath,
        old_hash: String,
        new_content: String,
        new_hash: String,
    },
    Delete {
        path: RelPath,
        old_hash: String,
    },
}

impl FileChange {
    pub fn path(&self) -> &RelPath {
        match self {
            FileChange::Create { path, .. } => path,
            FileChange::Update { path, .. } => path,
            FileChange::Delete { path, .. } => path,
        }
    }

    pub fn new_content(&self) -> Option<&str> {
        match self {
            FileChange::Create { new_content, .. } => Some(new_content),
            FileChange::Update { new_content, .. } => Some(new_content),
            FileChange::Delete { .. } => None,
        }
    }

    pub fn old_hash(&self) -> Option<&str> {
        match self {
            FileChange::Create { .. } => None,
            FileChange::Update { old_hash, .. } => Some(old_hash),
            FileChange::Delete { old_hash, .. } => Some(old_hash),
        }
    }

    pub fn new_hash(&self) -> Option<&str> {
        match self {
            FileChange::Create { new_hash, .. } => Some(new_hash),
            FileChange::Update { new_hash, .. } => Some(new_hash),
            FileChange::Delete { .. } => None,
        }
    }
}

/// Build a CREATE, computing `new_hash` from `new_content`.
pub fn create(path: RelPath, new_content: impl Into<String>) -> FileChange {
    let new_content = new_content.into();
    let new_hash = lc_core::hasher::hash_str(&new_content);
    FileChange::Create {
        path,
        new_content,
        new_hash,
    }
}

/// Build an UPDATE, computing `new_hash` from `new_content`. `old_hash`
/// must be supplied by the caller — it is the hash observed when the
/// plan was drafted, re-verified against the live file at apply time.
pub fn update(path: RelPath, old_hash: impl Into<String>, new_content: impl Into<String>) -> FileChange {
    let new_content = new_content.into();
    let new_hash = lc_core::hasher::hash_str(&new_content);
    FileChange::Update {
        path,
        old_hash: old_hash.into(),
        new_content,
        new_hash,
    }
}

pub fn delete(path: RelPath, old_hash: impl Into<String>) -> FileChange {
    FileChange::Delete {
        path,
        old_hash: old_hash.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_computes_new_hash() {
        let fc = create(RelPath::new("a.txt").unwrap(), "hello");
        assert_eq!(fc.new_hash(), Some(lc_core::hasher::hash_str("hello").as_str()));
    }

    #[test]
    fn serializes_with_op_tag() {
        let fc = create(RelPath::new("a.txt").unwrap(), "hello");
        let json = serde_json::to_value(&fc).unwrap();
        assert_eq!(json["op"], "create");
    }

    #[test]
    fn delete_has_no_new_content() {
        let fc = delete(RelPath::new("a.txt").unwrap(), "deadbeef");
        assert!(fc.new_content().is_none());
        assert_eq!(fc.old_hash(), Some("deadbeef"));
    }
}
