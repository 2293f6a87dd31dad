// error.rs — ExecutorError: the crate-local taxonomy for every failure the
// apply pipeline can raise, each mapping onto `lc_core::ErrorCode` via
// `code()` so callers outside this crate can reason about failures without
// matching the concrete variant.

use thiserror::Error;

use lc_core::ErrorCode;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("decision {decision_id} is not approved")]
    NotApproved { decision_id: uuid::Uuid },

    #[error("checksum mismatch for changeset {changeset_id}")]
    Tampered { changeset_id: uuid::Uuid },

    #[error("path violation: {0}")]
    PathViolation(String),

    #[error("stale update on `{path}`: expected hash {expected}, found {found}")]
    StaleUpdate {
        path: String,
        expected: String,
        found: String,
    },

    #[error("apply failed at `{path}`: {source}")]
    ApplyFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("verification failed: {0}")]
    VerifyFailed(String),

    #[error("health check failed: {0}")]
    HealthFailed(String),

    #[error("timeout after {elapsed_secs}s in step `{step}`")]
    Timeout { step: String, elapsed_secs: u64 },

    #[error("rollback failed: {0}")]
    RollbackFailed(String),

    #[error("lock error: {0}")]
    Lock(#[from] lc_lock::LockError),

    #[error("store error: {0}")]
    Store(#[from] lc_store::StoreError),

    #[error("artifact error: {0}")]
    Artifact(#[from] lc_artifacts::ArtifactError),

    #[error("core error: {0}")]
    Core(#[from] lc_core::CoreError),

    #[error("changeset error: {0}")]
    Changeset(#[from] lc_changeset::ChangesetError),

    #[error("reflection error: {0}")]
    Reflection(#[from] lc_reflection::ReflectionError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ExecutorError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ExecutorError::InvalidInput(_) => ErrorCode::InvalidInput,
            ExecutorError::NotApproved { .. } => ErrorCode::NotApproved,
            ExecutorError::Tampered { .. } => ErrorCode::Tampered,
            ExecutorError::PathViolation(_) => ErrorCode::PathViolation,
            ExecutorError::StaleUpdate { .. } => ErrorCode::StaleUpdate,
            ExecutorError::ApplyFailed { .. } => ErrorCode::ApplyFailed,
            ExecutorError::VerifyFailed(_) => ErrorCode::VerifyFailed,
            ExecutorError::HealthFailed(_) => ErrorCode::HealthFailed,
            ExecutorError::Timeout { .. } => ErrorCode::Timeout,
            ExecutorError::RollbackFailed(_) => ErrorCode::RollbackFailed,
            ExecutorError::Lock(_)
            | ExecutorError::Store(_)
            | ExecutorError::Artifact(_)
            | ExecutorError::Core(_)
            | ExecutorError::Changeset(_)
            | ExecutorError::Reflection(_)
            | ExecutorError::Internal(_) => ErrorCode::Internal,
        }
    }
}
