// rollback.rs — undoes a partially or fully applied ChangeSet in reverse
// order when a later pipeline step fails. Restores from the backups
// `applier::apply_one` wrote before mutating anything; never re-derives
// content, so a corrupt or missing backup is a hard RollbackFailed rather
// than a best-effort guess.

use std::fs;
use std::path::Path;

use lc_artifacts::ArtifactStore;

use crate::applier::Applied;
use crate::error::ExecutorError;

/// Reverse every entry in `applied`, most recent first. Returns `Ok(())`
/// only if every single undo succeeded; otherwise returns the first error
/// encountered and leaves the rest applied (their own undo may have already
/// run by the time the caller sees this, since we keep going to maximize
/// how much gets restored).
pub fn rollback(
    workspace_root: &Path,
    artifacts: &ArtifactStore,
    execution_id: &str,
    applied: &[Applied],
) -> Result<(), ExecutorError> {
    let mut first_error = None;

    for record in applied.iter().rev() {
        let outcome = match record {
            Applied::Created { path } => undo_create(workspace_root, path),
            Applied::Updated { path, had_backup } => {
                undo_restore(workspace_root, artifacts, execution_id, path, *had_backup)
            }
            Applied::Deleted { path, had_backup } => {
                undo_restore(workspace_root, artifacts, execution_id, path, *had_backup)
            }
        };
        if let Err(err) = outcome {
            tracing::warn!(execution_id, error = %err, "rollback step failed");
            if first_error.is_none() {
                first_error = Some(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(ExecutorError::RollbackFailed(err.to_string())),
        None => Ok(()),
    }
}

fn undo_create(workspace_root: &Path, relative_path: &str) -> Result<(), ExecutorError> {
    let target = workspace_root.join(relative_path);
    if target.exists() {
        fs::remove_file(&target).map_err(|source| ExecutorError::ApplyFailed {
            path: relative_path.to_string(),
            source,
        })?;
    }
    Ok(())
}

fn undo_restore(
    workspace_root: &Path,
    artifacts: &ArtifactStore,
    execution_id: &str,
    relative_path: &str,
    had_backup: bool,
) -> Result<(), ExecutorError> {
    if !had_backup {
        return Err(ExecutorError::RollbackFailed(format!(
            "no backup recorded for `{relative_path}`"
        )));
    }
    let content = artifacts.read_backup(execution_id, relative_path)?;
    let target = workspace_root.join(relative_path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| ExecutorError::ApplyFailed {
            path: relative_path.to_string(),
            source,
        })?;
    }
    fs::write(&target, content).map_err(|source| ExecutorError::ApplyFailed {
        path: relative_path.to_string(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc_changeset::file_change::{create, delete, update};
    use lc_core::hasher::hash_bytes;
    use lc_core::path::RelPath;

    #[test]
    fn rollback_removes_created_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path());
        let change = create(RelPath::new("new.txt").unwrap(), "hi");
        let applied = crate::applier::apply_one(dir.path(), &artifacts, "exec-1", &change).unwrap();
        assert!(dir.path().join("new.txt").exists());

        rollback(dir.path(), &artifacts, "exec-1", &[applied]).unwrap();
        assert!(!dir.path().join("new.txt").exists());
    }

    #[test]
    fn rollback_restores_updated_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "old").unwrap();
        let old_hash = hash_bytes(b"old");
        let artifacts = ArtifactStore::new(dir.path());
        let change = update(RelPath::new("a.txt").unwrap(), old_hash, "new");
        let applied = crate::applier::apply_one(dir.path(), &artifacts, "exec-1", &change).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "new");

        rollback(dir.path(), &artifacts, "exec-1", &[applied]).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "old");
    }

    #[test]
    fn rollback_restores_deleted_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "keep me").unwrap();
        let old_hash = hash_bytes(b"keep me");
        let artifacts = ArtifactStore::new(dir.path());
        let change = delete(RelPath::new("a.txt").unwrap(), old_hash);
        let applied = crate::applier::apply_one(dir.path(), &artifacts, "exec-1", &change).unwrap();
        assert!(!dir.path().join("a.txt").exists());

        rollback(dir.path(), &artifacts, "exec-1", &[applied]).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "keep me");
    }

    #[test]
    fn rollback_reverses_multiple_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path());
        let c1 = create(RelPath::new("one.txt").unwrap(), "1");
        let c2 = create(RelPath::new("two.txt").unwrap(), "2");
        let a1 = crate::applier::apply_one(dir.path(), &artifacts, "exec-1", &c1).unwrap();
        let a2 = crate::applier::apply_one(dir.path(), &artifacts, "exec-1", &c2).unwrap();

        rollback(dir.path(), &artifacts, "exec-1", &[a1, a2]).unwrap();
        assert!(!dir.path().join("one.txt").exists());
        assert!(!dir.path().join("two.txt").exists());
    }

    #[test]
    fn rollback_without_backup_errors() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path());
        let applied = vec![Applied::Updated {
            path: "missing.txt".to_string(),
            had_backup: false,
        }];
        let result = rollback(dir.path(), &artifacts, "exec-1", &applied);
        assert!(matches!(result, Err(ExecutorError::RollbackFailed(_))));
    }
}
