use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read lock metadata at {path}: {source}")]
    MetadataCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("timed out after {waited_secs}s waiting for the execution lock (held by pid {holder_pid})")]
    Timeout { waited_secs: u64, holder_pid: u32 },
}
