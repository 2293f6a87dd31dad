//! The Artifact Store: one directory per execution holding the four-piece
//! JSON set, a hash-chained event stream, per-step logs, and backups.

pub mod error;
pub mod events;
pub mod store;

pub use error::ArtifactError;
pub use events::{EventPhase, StepEvent};
pub use store::{ArtifactStore, RetentionPolicy, FOUR_PIECE_NAMES};
