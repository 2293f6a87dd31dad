//! ChangePlan, ChangeSet, and FileChange — the data model shared by every
//! stage of the governed change execution core.

pub mod changeset;
pub mod error;
pub mod file_change;
pub mod health;
pub mod plan;

pub use changeset::ChangeSet;
pub use error::ChangesetError;
pub use file_change::FileChange;
pub use health::{HealthCheckResult, HealthCheckSpec, HealthErrorCode};
pub use plan::{ChangePlan, RiskLevel, VerificationStep};
