// state.rs — PlannerState: the deterministic state machine an intent moves
// through on its way to a ChangePlan + ChangeSet.
//
// Modeled on `ta_goal::GoalRun`'s `GoalRunState` — `can_transition_to`
// returning a bool rather than unwinding, and a strictly linear chain (no
// backtrack edge, unlike GoalRun's UnderReview → Running loop) since §4.1
// describes INTENT → ANALYSIS → PLAN_GENERATION → GOVERNANCE_CHECK →
// EXECUTION_READY as one-directional.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PlannerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerState {
    Intent,
    Analysis,
    PlanGeneration,
    GovernanceCheck,
    ExecutionReady,
}

impl fmt::Display for PlannerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlannerState::Intent => "intent",
            PlannerState::Analysis => "analysis",
            PlannerState::PlanGeneration => "plan_generation",
            PlannerState::GovernanceCheck => "governance_check",
            PlannerState::ExecutionReady => "execution_ready",
        };
        write!(f, "{s}")
    }
}

/// A tool category a state is permitted to invoke. Read-only tools in
/// Analysis, diff-generating tools in PlanGeneration, policy-evaluation
/// only in GovernanceCheck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    ReadOnly,
    DiffGenerating,
    PolicyEvaluation,
}

impl PlannerState {
    pub fn can_transition_to(self, next: PlannerState) -> bool {
        matches!(
            (self, next),
            (PlannerState::Intent, PlannerState::Analysis)
                | (PlannerState::Analysis, PlannerState::PlanGeneration)
                | (PlannerState::PlanGeneration, PlannerState::GovernanceCheck)
                | (PlannerState::GovernanceCheck, PlannerState::ExecutionReady)
        )
    }

    pub fn transition(self, next: PlannerState) -> Result<PlannerState, PlannerError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(PlannerError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// The tool categories this state's reasoning tool may invoke. Any
    /// output the Planner validates against this set — non-determinism
    /// comes exclusively from the reasoning tool, never from the state
    /// machine itself.
    pub fn permitted_tools(self) -> &'static [ToolCategory] {
        match self {
            PlannerState::Intent => &[],
            PlannerState::Analysis => &[ToolCategory::ReadOnly],
            PlannerState::PlanGeneration => &[ToolCategory::ReadOnly, ToolCategory::DiffGenerating],
            PlannerState::GovernanceCheck => &[ToolCategory::PolicyEvaluation],
            PlannerState::ExecutionReady => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_chain_transitions_are_valid() {
        assert!(PlannerState::Intent.can_transition_to(PlannerState::Analysis));
        assert!(PlannerState::Analysis.can_transition_to(PlannerState::PlanGeneration));
        assert!(PlannerState::PlanGeneration.can_transition_to(PlannerState::GovernanceCheck));
        assert!(PlannerState::GovernanceCheck.can_transition_to(PlannerState::ExecutionReady));
    }

    #[test]
    fn skipping_a_state_is_invalid() {
        assert!(!PlannerState::Intent.can_transition_to(PlannerState::PlanGeneration));
    }

    #[test]
    fn backward_transition_is_invalid() {
        assert!(!PlannerState::Analysis.can_transition_to(PlannerState::Intent));
    }

    #[test]
    fn transition_returns_error_for_invalid_edge() {
        let result = PlannerState::Intent.transition(PlannerState::ExecutionReady);
        assert!(matches!(result, Err(PlannerError::InvalidTransition { .. })));
    }

    #[test]
    fn analysis_permits_only_read_only_tools() {
        assert_eq!(PlannerState::Analysis.permitted_tools(), &[ToolCategory::ReadOnly]);
    }
}
