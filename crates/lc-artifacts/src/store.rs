// store.rs — ArtifactStore: one directory per execution holding the
// four-piece JSON set (plan/changeset/decision/execution), `events.jsonl`,
// per-step logs under `steps/`, and `backups/`. Reads are gated by a path
// whitelist so only paths canonicalizing under the executions root are
// ever served, mirroring `lc_core::path::RelPath::resolve_checked`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::ArtifactError;
use crate::events::{self, StepEvent};

pub const FOUR_PIECE_NAMES: [&str; 4] = ["plan", "changeset", "decision", "execution"];

#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub max_age_days: u32,
    pub max_count: usize,
    pub grace_period_hours: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age_days: 7,
            max_count: 100,
            grace_period_hours: 1,
        }
    }
}

pub struct ArtifactStore {
    executions_root: PathBuf,
}

impl ArtifactStore {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            executions_root: workspace_root.as_ref().join(".lonelycat").join("executions"),
        }
    }

    pub fn executions_root(&self) -> &Path {
        &self.executions_root
    }

    pub fn execution_dir(&self, execution_id: &str) -> PathBuf {
        self.executions_root.join(execution_id)
    }

    pub fn ensure_dir(&self, execution_id: &str) -> Result<PathBuf, ArtifactError> {
        let dir = self.execution_dir(execution_id);
        fs::create_dir_all(dir.join("steps")).map_err(|source| ArtifactError::Io {
            path: dir.clone(),
            source,
        })?;
        fs::create_dir_all(dir.join("backups")).map_err(|source| ArtifactError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Only paths that canonicalize under `executions_root` are served —
    /// this is the whitelist gate §4.7 requires for external reads.
    fn resolve_checked(&self, execution_id: &str, relative: &str) -> Result<PathBuf, ArtifactError> {
        let candidate = self.execution_dir(execution_id).join(relative);
        let root = self
            .executions_root
            .canonicalize()
            .unwrap_or_else(|_| self.executions_root.clone());
        if let Ok(canon) = candidate.canonicalize() {
            if !canon.starts_with(&root) {
                return Err(ArtifactError::PathEscape {
                    path: candidate.display().to_string(),
                });
            }
        } else if !candidate.starts_with(&self.execution_dir(execution_id)) {
            return Err(ArtifactError::PathEscape {
                path: candidate.display().to_string(),
            });
        }
        Ok(candidate)
    }

    pub fn write_piece<T: Serialize>(
        &self,
        execution_id: &str,
        name: &str,
        value: &T,
    ) -> Result<(), ArtifactError> {
        self.ensure_dir(execution_id)?;
        let path = self.execution_dir(execution_id).join(format!("{name}.json"));
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json).map_err(|source| ArtifactError::Io { path, source })
    }

    pub fn read_piece<T: DeserializeOwned>(
        &self,
        execution_id: &str,
        name: &str,
    ) -> Result<T, ArtifactError> {
        let path = self.resolve_checked(execution_id, &format!("{name}.json"))?;
        let content = fs::read_to_string(&path).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn four_piece_complete(&self, execution_id: &str) -> bool {
        FOUR_PIECE_NAMES
            .iter()
            .all(|name| self.execution_dir(execution_id).join(format!("{name}.json")).exists())
    }

    /// Back up a file's current bytes (and mode, on unix) before it is
    /// mutated or deleted, under `backups/<path>`.
    #[allow(unused_variables)]
    pub fn backup_file(
        &self,
        execution_id: &str,
        relative_path: &str,
        content: &[u8],
        mode: Option<u32>,
    ) -> Result<(), ArtifactError> {
        self.ensure_dir(execution_id)?;
        let backup_path = self.execution_dir(execution_id).join("backups").join(relative_path);
        if let Some(parent) = backup_path.parent() {
            fs::create_dir_all(parent).map_err(|source| ArtifactError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&backup_path, content).map_err(|source| ArtifactError::Io {
            path: backup_path.clone(),
            source,
        })?;
        #[cfg(unix)]
        if let Some(mode) = mode {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&backup_path, fs::Permissions::from_mode(mode));
        }
        Ok(())
    }

    pub fn read_backup(&self, execution_id: &str, relative_path: &str) -> Result<Vec<u8>, ArtifactError> {
        let backup_path = self.resolve_checked(execution_id, &format!("backups/{relative_path}"))?;
        fs::read(&backup_path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ArtifactError::BackupMissing {
                    execution_id: execution_id.to_string(),
                    path: relative_path.to_string(),
                }
            } else {
                ArtifactError::Io {
                    path: backup_path.clone(),
                    source,
                }
            }
        })
    }

    pub fn has_backup(&self, execution_id: &str, relative_path: &str) -> bool {
        self.execution_dir(execution_id).join("backups").join(relative_path).exists()
    }

    pub fn step_log_path(&self, execution_id: &str, step_num: u32, step_name: &str) -> PathBuf {
        self.execution_dir(execution_id)
            .join("steps")
            .join(format!("{step_num:02}_{step_name}.log"))
    }

    pub fn write_step_log(
        &self,
        execution_id: &str,
        step_num: u32,
        step_name: &str,
        content: &str,
    ) -> Result<(), ArtifactError> {
        self.ensure_dir(execution_id)?;
        let path = self.step_log_path(execution_id, step_num, step_name);
        fs::write(&path, content).map_err(|source| ArtifactError::Io { path, source })
    }

    fn events_path(&self, execution_id: &str) -> PathBuf {
        self.execution_dir(execution_id).join("events.jsonl")
    }

    pub fn append_event(&self, execution_id: &str, event: StepEvent) -> Result<(), ArtifactError> {
        self.ensure_dir(execution_id)?;
        events::append_event(&self.events_path(execution_id), event)
    }

    pub fn read_events(&self, execution_id: &str) -> Result<Vec<StepEvent>, ArtifactError> {
        events::read_all(&self.events_path(execution_id))
    }

    pub fn tail_events(&self, execution_id: &str, n: usize) -> Result<Vec<StepEvent>, ArtifactError> {
        events::tail(&self.events_path(execution_id), n)
    }

    /// Prune execution directories by the larger of age and count policy.
    /// Never removes a directory younger than `grace_period_hours` even if
    /// the count policy would otherwise select it.
    pub fn prune(&self, policy: &RetentionPolicy) -> Result<Vec<String>, ArtifactError> {
        if !self.executions_root.exists() {
            return Ok(Vec::new());
        }
        let mut entries: Vec<(String, PathBuf, std::time::SystemTime)> = Vec::new();
        for entry in fs::read_dir(&self.executions_root).map_err(|source| ArtifactError::Io {
            path: self.executions_root.clone(),
            source,
        })? {
            let entry = entry.map_err(|source| ArtifactError::Io {
                path: self.executions_root.clone(),
                source,
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            entries.push((
                entry.file_name().to_string_lossy().to_string(),
                entry.path(),
                modified,
            ));
        }
        entries.sort_by_key(|(_, _, modified)| *modified);
        entries.reverse(); // newest first

        let now = std::time::SystemTime::now();
        let grace = std::time::Duration::from_secs(u64::from(policy.grace_period_hours) * 3600);
        let max_age = std::time::Duration::from_secs(u64::from(policy.max_age_days) * 86400);

        let mut pruned = Vec::new();
        for (index, (execution_id, path, modified)) in entries.iter().enumerate() {
            let age = now.duration_since(*modified).unwrap_or_default();
            if age < grace {
                continue;
            }
            let exceeds_count = index >= policy.max_count;
            let exceeds_age = age > max_age;
            if exceeds_count && exceeds_age {
                fs::remove_dir_all(path).map_err(|source| ArtifactError::Io {
                    path: path.clone(),
                    source,
                })?;
                pruned.push(execution_id.clone());
            }
        }
        Ok(pruned)
    }
}
