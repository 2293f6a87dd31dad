//! WriteGate — the deterministic policy judge for the governed change
//! execution core. `evaluate` is a pure function of (plan, changeset,
//! policy snapshot, optional reflection hints) that never mutates or
//! executes the change set it judges.

pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod reflection_hints;

pub use config::{CommandProfile, PolicyConfig};
pub use decision::{EvaluationStep, GovernanceApproval, GovernanceDecision, Verdict};
pub use engine::evaluate;
pub use error::PolicyError;
pub use reflection_hints::ReflectionHintsRef;
