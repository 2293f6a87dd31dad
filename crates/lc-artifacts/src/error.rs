use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("path `{path}` is outside the artifact store's executions directory")]
    PathEscape { path: String },

    #[error("no backup recorded for `{path}` in execution `{execution_id}`")]
    BackupMissing { execution_id: String, path: String },
}
