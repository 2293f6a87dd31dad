use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReflectionError {
    #[error("store error: {0}")]
    Store(#[from] lc_store::StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("execution not found: {execution_id}")]
    ExecutionNotFound { execution_id: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
