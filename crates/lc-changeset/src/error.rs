use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChangesetError {
    #[error("invalid path in change set: {0}")]
    InvalidPath(#[from] lc_core::CoreError),

    #[error("change set is empty: at least one FileChange is required")]
    Empty,

    #[error("duplicate path `{path}` in change set: each path may be touched once")]
    DuplicatePath { path: String },

    #[error("changeset checksum does not match its content (changeset_id={changeset_id})")]
    ChecksumMismatch { changeset_id: uuid::Uuid },
}
