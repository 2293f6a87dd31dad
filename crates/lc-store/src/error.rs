use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open execution store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("sqlite connection lock poisoned")]
    LockPoisoned,

    #[error("migration {version} failed: {source}")]
    Migration {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("sqlite query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("failed to (de)serialize stored record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("execution `{execution_id}` not found")]
    NotFound { execution_id: String },

    #[error("decision `{decision_id}` has no recorded approval")]
    ApprovalMissing { decision_id: String },
}
