// manager.rs — LockManager: a process-safe, machine-local mutex scoped to
// one workspace, backed by atomic creation of a lock file
// (`.lonelycat/locks/execution.lock`, O_CREAT|O_EXCL).
//
// Stale-lock detection is conservative by construction: a lock is only
// cleared when its age exceeds a threshold AND its recorded pid is no
// longer alive on this host (`ta-workspace`'s `OpenOptions`-based file
// idiom, extended with `create_new(true)` for O_EXCL; liveness probed with
// `libc::kill(pid, 0)`, matching the existing `libc` dependency).

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LockError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockMetadata {
    pub execution_id: String,
    pub plan_id: Uuid,
    pub acquired_at: DateTime<Utc>,
    pub pid: u32,
    pub hostname: String,
}

/// In-process reentrancy state: the execution_id currently held by this
/// process, and how many nested `acquire` calls are outstanding for it.
struct HeldState {
    execution_id: String,
    depth: u32,
}

pub struct LockManager {
    lock_path: PathBuf,
    poll_interval: Duration,
    max_poll_interval: Duration,
    stale_age: Duration,
    held: Arc<Mutex<Option<HeldState>>>,
}

/// An acquired lock. Dropping it releases the lock (or decrements the
/// reentrancy depth if this was a nested acquisition).
pub struct LockGuard {
    manager: LockManager,
    top_level: bool,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.top_level {
            let mut held = self.manager.held.lock().unwrap();
            if let Some(state) = held.as_mut() {
                state.depth = state.depth.saturating_sub(1);
            }
            return;
        }
        if let Err(err) = self.manager.release() {
            tracing::warn!(error = %err, "failed to release execution lock on drop");
        }
    }
}

impl Clone for LockManager {
    fn clone(&self) -> Self {
        Self {
            lock_path: self.lock_path.clone(),
            poll_interval: self.poll_interval,
            max_poll_interval: self.max_poll_interval,
            stale_age: self.stale_age,
            held: Arc::clone(&self.held),
        }
    }
}

impl LockManager {
    /// Build a manager scoped to `<workspace_root>/.lonelycat/locks/execution.lock`.
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        let lock_path = workspace_root
            .as_ref()
            .join(".lonelycat")
            .join("locks")
            .join("execution.lock");
        Self {
            lock_path,
            poll_interval: Duration::from_millis(50),
            max_poll_interval: Duration::from_secs(5),
            stale_age: Duration::from_secs(120),
            held: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_stale_age(mut self, stale_age: Duration) -> Self {
        self.stale_age = stale_age;
        self
    }

    /// Acquire the lock for `execution_id`, polling with exponential
    /// backoff until `timeout` elapses. Reentrant: if this process already
    /// holds the lock for the same `execution_id`, returns immediately
    /// without touching the filesystem.
    pub fn acquire(
        &self,
        execution_id: &str,
        plan_id: Uuid,
        timeout: Duration,
    ) -> Result<LockGuard, LockError> {
        {
            let mut held = self.held.lock().unwrap();
            if let Some(state) = held.as_mut() {
                if state.execution_id == execution_id {
                    state.depth += 1;
                    return Ok(LockGuard {
                        manager: self.clone(),
                        top_level: false,
                    });
                }
            }
        }

        let deadline = Instant::now() + timeout;
        let mut interval = self.poll_interval;

        loop {
            match self.try_create(execution_id, plan_id) {
                Ok(()) => {
                    *self.held.lock().unwrap() = Some(HeldState {
                        execution_id: execution_id.to_string(),
                        depth: 1,
                    });
                    tracing::info!(execution_id, "acquired execution lock");
                    return Ok(LockGuard {
                        manager: self.clone(),
                        top_level: true,
                    });
                }
                Err(LockError::Io { source, .. }) if source.kind() == std::io::ErrorKind::AlreadyExists => {
                    if let Some(meta) = self.read_metadata() {
                        if self.is_stale(&meta) {
                            tracing::warn!(
                                holder_pid = meta.pid,
                                age_secs = (Utc::now() - meta.acquired_at).num_seconds(),
                                "clearing stale execution lock"
                            );
                            let _ = fs::remove_file(&self.lock_path);
                            continue;
                        }
                        if Instant::now() >= deadline {
                            return Err(LockError::Timeout {
                                waited_secs: timeout.as_secs(),
                                holder_pid: meta.pid,
                            });
                        }
                    } else if Instant::now() >= deadline {
                        return Err(LockError::Timeout {
                            waited_secs: timeout.as_secs(),
                            holder_pid: 0,
                        });
                    }
                    std::thread::sleep(interval);
                    interval = (interval * 2).min(self.max_poll_interval);
                }
                Err(other) => return Err(other),
            }
        }
    }

    fn try_create(&self, execution_id: &str, plan_id: Uuid) -> Result<(), LockError> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent).map_err(|source| LockError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(|source| LockError::Io {
                path: self.lock_path.clone(),
                source,
            })?;

        let metadata = LockMetadata {
            execution_id: execution_id.to_string(),
            plan_id,
            acquired_at: Utc::now(),
            pid: std::process::id(),
            hostname: hostname(),
        };
        let json = serde_json::to_string(&metadata).unwrap_or_default();
        file.write_all(json.as_bytes()).map_err(|source| LockError::Io {
            path: self.lock_path.clone(),
            source,
        })?;
        Ok(())
    }

    fn read_metadata(&self) -> Option<LockMetadata> {
        let mut file = File::open(&self.lock_path).ok()?;
        let mut content = String::new();
        file.read_to_string(&mut content).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Stale only when (a) age exceeds the configured threshold AND (b)
    /// the recorded pid is not alive on this host. Never clears a live pid
    /// and never clears by age alone.
    fn is_stale(&self, metadata: &LockMetadata) -> bool {
        let age = Utc::now().signed_duration_since(metadata.acquired_at);
        let age = age.to_std().unwrap_or(Duration::ZERO);
        age > self.stale_age && !pid_is_alive(metadata.pid)
    }

    /// Release the lock, deleting the lock file. No-op if not held.
    pub fn release(&self) -> Result<(), LockError> {
        *self.held.lock().unwrap() = None;
        match fs::remove_file(&self.lock_path) {
            Ok(()) => {
                tracing::info!("released execution lock");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LockError::Io {
                path: self.lock_path.clone(),
                source,
            }),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock_path.exists()
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(unix)]
fn pid_is_alive(pid: u32) -> bool {
    // `kill(pid, 0)` sends no signal — it only checks whether the process
    // exists and is visible to us. ESRCH means the pid is gone.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn pid_is_alive(_pid: u32) -> bool {
    // Conservative: assume alive when liveness cannot be probed, so a
    // stale lock is never cleared based on age alone.
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release_clears_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = LockManager::new(dir.path());
        assert!(!manager.is_locked());
        let guard = manager.acquire("exec-1", Uuid::new_v4(), Duration::from_secs(1)).unwrap();
        assert!(manager.is_locked());
        drop(guard);
        assert!(!manager.is_locked());
    }

    #[test]
    fn second_acquire_times_out_while_first_holds() {
        let dir = tempfile::tempdir().unwrap();
        let manager_a = LockManager::new(dir.path());
        let manager_b = LockManager::new(dir.path());
        let _guard = manager_a.acquire("exec-1", Uuid::new_v4(), Duration::from_secs(1)).unwrap();
        let result = manager_b.acquire("exec-2", Uuid::new_v4(), Duration::from_millis(200));
        assert!(matches!(result, Err(LockError::Timeout { .. })));
    }

    #[test]
    fn reentrant_acquire_for_same_execution_succeeds_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let manager = LockManager::new(dir.path());
        let outer = manager.acquire("exec-1", Uuid::new_v4(), Duration::from_secs(1)).unwrap();
        let inner = manager.acquire("exec-1", Uuid::new_v4(), Duration::from_millis(10)).unwrap();
        drop(inner);
        assert!(manager.is_locked());
        drop(outer);
        assert!(!manager.is_locked());
    }

    #[test]
    fn stale_lock_with_dead_pid_is_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let manager = LockManager::new(dir.path()).with_stale_age(Duration::from_secs(0));
        let lock_dir = dir.path().join(".lonelycat").join("locks");
        fs::create_dir_all(&lock_dir).unwrap();
        let stale = LockMetadata {
            execution_id: "ghost".into(),
            plan_id: Uuid::new_v4(),
            acquired_at: Utc::now() - chrono::Duration::seconds(1000),
            pid: 999_999, // Unlikely to be a live pid in the test environment.
            hostname: "host".into(),
        };
        fs::write(
            lock_dir.join("execution.lock"),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

        let guard = manager
            .acquire("exec-new", Uuid::new_v4(), Duration::from_secs(2))
            .unwrap();
        drop(guard);
    }

    #[test]
    fn live_pid_lock_is_never_cleared_by_age_alone() {
        let dir = tempfile::tempdir().unwrap();
        let manager = LockManager::new(dir.path()).with_stale_age(Duration::from_secs(0));
        let lock_dir = dir.path().join(".lonelycat").join("locks");
        fs::create_dir_all(&lock_dir).unwrap();
        let live = LockMetadata {
            execution_id: "holder".into(),
            plan_id: Uuid::new_v4(),
            acquired_at: Utc::now() - chrono::Duration::seconds(1000),
            pid: std::process::id(),
            hostname: "host".into(),
        };
        fs::write(
            lock_dir.join("execution.lock"),
            serde_json::to_string(&live).unwrap(),
        )
        .unwrap();

        let result = manager.acquire("exec-new", Uuid::new_v4(), Duration::from_millis(150));
        assert!(matches!(result, Err(LockError::Timeout { .. })));
    }
}
