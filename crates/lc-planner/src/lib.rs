//! Planner — turns an agent's stated intent into a ChangePlan, walking the
//! INTENT → ANALYSIS → PLAN_GENERATION → GOVERNANCE_CHECK → EXECUTION_READY
//! state machine and shaping risk from intent type and affected paths.

pub mod error;
pub mod intent;
pub mod planner;
pub mod state;

pub use error::PlannerError;
pub use intent::IntentType;
pub use planner::{PlanDraft, Planner, RiskShapingConfig};
pub use state::{PlannerState, ToolCategory};
