//! Similarity search and offline reflection analysis over the execution
//! store. Everything here is advisory: it never mutates executions and
//! never changes a WriteGate verdict, only supplies evidence a human or a
//! reasoning tool can act on.

pub mod error;
pub mod hints;
pub mod repair;
pub mod similarity;

pub use error::ReflectionError;
pub use hints::{build_hints, ErrorStepFrequency, FalseAllowPattern, ReflectionHints, SlowStep, Window};
pub use repair::{synthesize_repair, RepairCandidate, RepairDraft};
pub use similarity::{
    error_only_score, is_false_allow, path_only_score, rank, rank_by_error, rank_by_paths, score, ScoredExecution,
};
