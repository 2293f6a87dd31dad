// applier.rs — applies a ChangeSet's FileChanges to the workspace root.
//
// Grounded on `ta_workspace::overlay::OverlayWorkspace`'s apply_to/apply_selective
// temp-file-then-rename pattern, adapted from "copy staging file over target"
// to "write new content through a temp file and atomically rename it", since
// here there is no staging copy to read from — only the FileChange's embedded
// content.

use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use lc_changeset::FileChange;
use lc_core::hasher::{hash_bytes, hash_file};

use crate::error::ExecutorError;

#[cfg(unix)]
fn file_mode(path: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).ok().map(|m| m.permissions().mode())
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> Option<u32> {
    None
}

#[cfg(unix)]
fn set_file_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(mode));
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path, _mode: u32) {}

/// One applied change, recorded so rollback knows exactly what to undo.
#[derive(Debug, Clone)]
pub enum Applied {
    Created { path: String },
    Updated { path: String, had_backup: bool },
    Deleted { path: String, had_backup: bool },
}

/// Write `content` to `path` via a temp file in the same directory followed
/// by an atomic rename, so a crash mid-write never leaves a half-written
/// file in place of the original.
fn atomic_write(path: &Path, content: &[u8], mode: Option<u32>) -> Result<(), ExecutorError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|source| ExecutorError::ApplyFailed {
        path: path.display().to_string(),
        source,
    })?;

    let tmp_path = parent.join(format!(
        ".{}.lc-tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("apply")
    ));

    let mut file = File::create(&tmp_path).map_err(|source| ExecutorError::ApplyFailed {
        path: tmp_path.display().to_string(),
        source,
    })?;
    file.write_all(content).map_err(|source| ExecutorError::ApplyFailed {
        path: tmp_path.display().to_string(),
        source,
    })?;
    file.sync_all().map_err(|source| ExecutorError::ApplyFailed {
        path: tmp_path.display().to_string(),
        source,
    })?;
    drop(file);

    if let Some(mode) = mode {
        set_file_mode(&tmp_path, mode);
    }

    fs::rename(&tmp_path, path).map_err(|source| ExecutorError::ApplyFailed {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

/// Apply one FileChange against `workspace_root`, backing up pre-image
/// bytes for UPDATE/DELETE before touching anything. Returns the `Applied`
/// record rollback needs, or an `ExecutorError` with nothing yet written.
pub fn apply_one(
    workspace_root: &Path,
    artifacts: &lc_artifacts::ArtifactStore,
    execution_id: &str,
    change: &FileChange,
) -> Result<Applied, ExecutorError> {
    let rel = change.path();
    let target = rel
        .resolve_checked(workspace_root)
        .map_err(|e| ExecutorError::PathViolation(e.to_string()))?;

    match change {
        FileChange::Create { new_content, .. } => {
            if target.exists() {
                return Err(ExecutorError::ApplyFailed {
                    path: rel.as_str().to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "file already exists for CREATE",
                    ),
                });
            }
            atomic_write(&target, new_content.as_bytes(), None)?;
            Ok(Applied::Created {
                path: rel.as_str().to_string(),
            })
        }
        FileChange::Update {
            old_hash,
            new_content,
            ..
        } => {
            let found = hash_file(&target).map_err(|source| ExecutorError::ApplyFailed {
                path: rel.as_str().to_string(),
                source,
            })?;
            if &found != old_hash {
                return Err(ExecutorError::StaleUpdate {
                    path: rel.as_str().to_string(),
                    expected: old_hash.clone(),
                    found,
                });
            }
            let mode = file_mode(&target);
            let current = fs::read(&target).map_err(|source| ExecutorError::ApplyFailed {
                path: rel.as_str().to_string(),
                source,
            })?;
            artifacts.backup_file(execution_id, rel.as_str(), &current, mode)?;
            atomic_write(&target, new_content.as_bytes(), mode)?;
            Ok(Applied::Updated {
                path: rel.as_str().to_string(),
                had_backup: true,
            })
        }
        FileChange::Delete { old_hash, .. } => {
            let found = hash_file(&target).map_err(|source| ExecutorError::ApplyFailed {
                path: rel.as_str().to_string(),
                source,
            })?;
            if &found != old_hash {
                return Err(ExecutorError::StaleUpdate {
                    path: rel.as_str().to_string(),
                    expected: old_hash.clone(),
                    found,
                });
            }
            let mode = file_mode(&target);
            let current = fs::read(&target).map_err(|source| ExecutorError::ApplyFailed {
                path: rel.as_str().to_string(),
                source,
            })?;
            artifacts.backup_file(execution_id, rel.as_str(), &current, mode)?;
            fs::remove_file(&target).map_err(|source| ExecutorError::ApplyFailed {
                path: rel.as_str().to_string(),
                source,
            })?;
            Ok(Applied::Deleted {
                path: rel.as_str().to_string(),
                had_backup: true,
            })
        }
    }
}

/// Re-verify every UPDATE/DELETE's declared `old_hash` against the live
/// file before anything is mutated. This is the pipeline's `backup` step's
/// gate: a stale pre-image here fails the execution before a single byte
/// has been touched, so no rollback is needed yet. CREATE entries have no
/// pre-image to check.
pub fn precheck(workspace_root: &Path, changes: &[FileChange]) -> Result<(), ExecutorError> {
    for change in changes {
        let Some(expected) = change.old_hash() else {
            continue;
        };
        let target = change
            .path()
            .resolve_checked(workspace_root)
            .map_err(|e| ExecutorError::PathViolation(e.to_string()))?;
        let found = hash_file(&target).map_err(|source| ExecutorError::ApplyFailed {
            path: change.path().as_str().to_string(),
            source,
        })?;
        if found != expected {
            return Err(ExecutorError::StaleUpdate {
                path: change.path().as_str().to_string(),
                expected: expected.to_string(),
                found,
            });
        }
    }
    Ok(())
}

/// Apply every FileChange in the order given, stopping at the first failure.
/// Returns the changes successfully applied so far alongside the error, so
/// the pipeline can roll back exactly what landed and nothing more.
pub fn apply_all(
    workspace_root: &Path,
    artifacts: &lc_artifacts::ArtifactStore,
    execution_id: &str,
    changes: &[FileChange],
) -> (Vec<Applied>, Option<ExecutorError>) {
    let mut applied = Vec::with_capacity(changes.len());
    for change in changes {
        match apply_one(workspace_root, artifacts, execution_id, change) {
            Ok(record) => applied.push(record),
            Err(err) => return (applied, Some(err)),
        }
    }
    (applied, None)
}

/// Verify a proposed FileChange's `new_hash` matches a freshly computed
/// hash of its `new_content`, catching a caller that hand-built a FileChange
/// with mismatched fields before it ever touches disk.
pub fn verify_new_hash(change: &FileChange) -> bool {
    match (change.new_content(), change.new_hash()) {
        (Some(content), Some(expected)) => hash_bytes(content.as_bytes()) == expected,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc_artifacts::ArtifactStore;
    use lc_changeset::file_change::{create, delete, update};
    use lc_core::path::RelPath;

    fn store(dir: &Path) -> ArtifactStore {
        ArtifactStore::new(dir)
    }

    #[test]
    fn create_writes_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(dir.path());
        let change = create(RelPath::new("src/new.txt").unwrap(), "hello");
        let applied = apply_one(dir.path(), &artifacts, "exec-1", &change).unwrap();
        assert!(matches!(applied, Applied::Created { .. }));
        assert_eq!(fs::read_to_string(dir.path().join("src/new.txt")).unwrap(), "hello");
    }

    #[test]
    fn create_rejects_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "already here").unwrap();
        let artifacts = store(dir.path());
        let change = create(RelPath::new("a.txt").unwrap(), "hello");
        let err = apply_one(dir.path(), &artifacts, "exec-1", &change).unwrap_err();
        assert!(matches!(err, ExecutorError::ApplyFailed { .. }));
    }

    #[test]
    fn update_rewrites_content_and_backs_up_old() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "old").unwrap();
        let old_hash = hash_bytes(b"old");
        let artifacts = store(dir.path());
        let change = update(RelPath::new("a.txt").unwrap(), old_hash, "new");
        apply_one(dir.path(), &artifacts, "exec-1", &change).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "new");
        let backup = artifacts.read_backup("exec-1", "a.txt").unwrap();
        assert_eq!(backup, b"old");
    }

    #[test]
    fn update_with_stale_hash_errors_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "current").unwrap();
        let artifacts = store(dir.path());
        let change = update(RelPath::new("a.txt").unwrap(), "not-the-real-hash", "new");
        let err = apply_one(dir.path(), &artifacts, "exec-1", &change).unwrap_err();
        assert!(matches!(err, ExecutorError::StaleUpdate { .. }));
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "current");
    }

    #[test]
    fn delete_removes_file_and_backs_it_up() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "gone soon").unwrap();
        let old_hash = hash_bytes(b"gone soon");
        let artifacts = store(dir.path());
        let change = delete(RelPath::new("a.txt").unwrap(), old_hash);
        apply_one(dir.path(), &artifacts, "exec-1", &change).unwrap();
        assert!(!dir.path().join("a.txt").exists());
        let backup = artifacts.read_backup("exec-1", "a.txt").unwrap();
        assert_eq!(backup, b"gone soon");
    }

    #[test]
    fn precheck_passes_create_with_no_preimage() {
        let dir = tempfile::tempdir().unwrap();
        let change = create(RelPath::new("new.txt").unwrap(), "hello");
        assert!(precheck(dir.path(), &[change]).is_ok());
    }

    #[test]
    fn precheck_catches_stale_update_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "current").unwrap();
        let change = update(RelPath::new("a.txt").unwrap(), "wrong-hash", "new");
        let err = precheck(dir.path(), &[change]).unwrap_err();
        assert!(matches!(err, ExecutorError::StaleUpdate { .. }));
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "current");
    }

    #[test]
    fn apply_all_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "current").unwrap();
        let artifacts = store(dir.path());
        let changes = vec![
            create(RelPath::new("b.txt").unwrap(), "b content"),
            update(RelPath::new("a.txt").unwrap(), "wrong-hash", "new"),
            create(RelPath::new("c.txt").unwrap(), "c content"),
        ];
        let (applied, err) = apply_all(dir.path(), &artifacts, "exec-1", &changes);
        assert_eq!(applied.len(), 1);
        assert!(err.is_some());
        assert!(!dir.path().join("c.txt").exists());
    }

    #[test]
    fn verify_new_hash_detects_mismatch() {
        let good = create(RelPath::new("a.txt").unwrap(), "hello");
        assert!(verify_new_hash(&good));

        let tampered = FileChange::Create {
            path: RelPath::new("a.txt").unwrap(),
            new_content: "hello".into(),
            new_hash: "deadbeef".into(),
        };
        assert!(!verify_new_hash(&tampered));
    }
}
