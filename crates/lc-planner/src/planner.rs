// planner.rs — Planner: turns an intent into a ChangePlan, auto-populating
// `rollback_plan`, `verification_plan`, and `health_checks` when the agent
// omitted them, and shaping `risk_level_proposed` from intent type and
// affected paths.

use lc_changeset::{ChangePlan, HealthCheckSpec, RiskLevel, VerificationStep};

use crate::error::PlannerError;
use crate::intent::IntentType;
use crate::state::{PlannerState, ToolCategory};

/// Configuration the Planner needs to shape risk: which paths are always
/// reviewed regardless of intent (schema, security, policy, the executor's
/// own sources — matches `lc_policy::PolicyConfig::always_review_paths`).
#[derive(Debug, Clone, Default)]
pub struct RiskShapingConfig {
    pub always_review_paths: Vec<String>,
}

pub struct Planner {
    config: RiskShapingConfig,
}

/// A plan draft before risk shaping has been auto-applied — what an
/// agent's reasoning tool hands back from PLAN_GENERATION.
pub struct PlanDraft {
    pub intent: String,
    pub objective: String,
    pub rationale: String,
    pub affected_paths: Vec<String>,
    pub created_by: String,
    pub rollback_plan: Vec<String>,
    pub verification_plan: Vec<VerificationStep>,
    pub health_checks: Vec<HealthCheckSpec>,
}

impl Planner {
    pub fn new(config: RiskShapingConfig) -> Self {
        Self { config }
    }

    /// Build a ChangePlan from a draft, walking it through
    /// INTENT → ANALYSIS → PLAN_GENERATION before handing it off, and
    /// gating each stage's work against that state's `permitted_tools`.
    ///
    /// Returns an error for an unrecognized intent type rather than
    /// producing a plan — §4.1's "invalid intent → returns error without
    /// producing a plan" failure mode.
    pub fn plan(&self, draft: PlanDraft) -> Result<ChangePlan, PlannerError> {
        let intent_type = IntentType::parse(&draft.intent)
            .ok_or_else(|| PlannerError::InvalidIntent(draft.intent.clone()))?;

        let state = PlannerState::Intent.transition(PlannerState::Analysis)?;
        let risk = self.invoke(state, ToolCategory::ReadOnly, || {
            self.shape_risk(intent_type, &draft.affected_paths)
        })?;

        let state = state.transition(PlannerState::PlanGeneration)?;
        let rollback_plan = if draft.rollback_plan.is_empty() {
            self.invoke(state, ToolCategory::DiffGenerating, || {
                self.auto_rollback_plan(risk, &draft.affected_paths)
            })?
        } else {
            draft.rollback_plan
        };
        let verification_plan = if draft.verification_plan.is_empty() {
            self.invoke(state, ToolCategory::DiffGenerating, || self.auto_verification_plan(intent_type))?
        } else {
            draft.verification_plan
        };
        let health_checks = if draft.health_checks.is_empty() {
            self.invoke(state, ToolCategory::DiffGenerating, || self.auto_health_checks(&draft.affected_paths))?
        } else {
            draft.health_checks
        };

        // PLAN_GENERATION is as far as the Planner's own tool calls reach —
        // GOVERNANCE_CHECK is WriteGate's evaluation and EXECUTION_READY is
        // the Executor's cue to apply. Walking both remaining edges here
        // confirms the plan this function hands off is one the rest of the
        // chain can actually advance, before any of it runs.
        state.transition(PlannerState::GovernanceCheck)?.transition(PlannerState::ExecutionReady)?;

        Ok(ChangePlan::new(
            draft.intent,
            draft.objective,
            draft.rationale,
            draft.affected_paths,
            risk,
            draft.created_by,
        )
        .with_rollback_plan(rollback_plan)
        .with_verification_plan(verification_plan)
        .with_health_checks(health_checks))
    }

    /// Run `f`, first checking that `state` permits `tool` — the
    /// enforcement side of §4.1's "validated against the current state's
    /// permitted operations" invariant.
    fn invoke<T>(&self, state: PlannerState, tool: ToolCategory, f: impl FnOnce() -> T) -> Result<T, PlannerError> {
        if !state.permitted_tools().contains(&tool) {
            return Err(PlannerError::ToolNotPermitted {
                state: state.to_string(),
                tool: format!("{tool:?}"),
            });
        }
        Ok(f())
    }

    /// Documentation-only updates map to low risk; anything touching an
    /// always-review root is forced to high risk regardless of intent.
    fn shape_risk(&self, intent_type: IntentType, affected_paths: &[String]) -> RiskLevel {
        let mut risk = intent_type.baseline_risk();
        if affected_paths
            .iter()
            .any(|path| matches_any(&self.config.always_review_paths, path))
        {
            risk = risk.max(RiskLevel::High);
        }
        risk
    }

    /// §4.1: "cannot infer safe rollback for a high-risk change → emits
    /// plan with empty rollback_plan" — WriteGate will then downgrade to
    /// NEED_APPROVAL rather than the Planner guessing at a recovery step
    /// it cannot stand behind.
    fn auto_rollback_plan(&self, risk: RiskLevel, affected_paths: &[String]) -> Vec<String> {
        if risk >= RiskLevel::High {
            return Vec::new();
        }
        affected_paths
            .iter()
            .map(|path| format!("restore `{path}` from its pre-apply backup"))
            .collect()
    }

    fn auto_verification_plan(&self, intent_type: IntentType) -> Vec<VerificationStep> {
        match intent_type {
            IntentType::UpdateDocs | IntentType::Investigate => Vec::new(),
            _ => vec![VerificationStep::TestRunner {
                profile_name: "default_test_suite".to_string(),
            }],
        }
    }

    fn auto_health_checks(&self, affected_paths: &[String]) -> Vec<HealthCheckSpec> {
        if affected_paths.is_empty() {
            return Vec::new();
        }
        vec![HealthCheckSpec::FileExists {
            paths: affected_paths.to_vec(),
        }]
    }
}

fn matches_any(patterns: &[String], path: &str) -> bool {
    patterns
        .iter()
        .any(|pattern| glob::Pattern::new(pattern).map(|g| g.matches(path)).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(intent: &str, affected_paths: Vec<&str>) -> PlanDraft {
        PlanDraft {
            intent: intent.to_string(),
            objective: "objective".into(),
            rationale: "rationale".into(),
            affected_paths: affected_paths.into_iter().map(String::from).collect(),
            created_by: "agent-1".into(),
            rollback_plan: Vec::new(),
            verification_plan: Vec::new(),
            health_checks: Vec::new(),
        }
    }

    #[test]
    fn invoke_rejects_a_tool_category_the_state_does_not_permit() {
        let planner = Planner::new(RiskShapingConfig::default());
        let result = planner.invoke(PlannerState::Analysis, ToolCategory::DiffGenerating, || 1);
        assert!(matches!(result, Err(PlannerError::ToolNotPermitted { .. })));
    }

    #[test]
    fn invoke_allows_a_tool_category_the_state_permits() {
        let planner = Planner::new(RiskShapingConfig::default());
        let result = planner.invoke(PlannerState::Analysis, ToolCategory::ReadOnly, || 1);
        assert_eq!(result.unwrap(), 1);
    }

    #[test]
    fn invalid_intent_errors_without_producing_plan() {
        let planner = Planner::new(RiskShapingConfig::default());
        let result = planner.plan(draft("teleport", vec!["a.txt"]));
        assert!(matches!(result, Err(PlannerError::InvalidIntent(_))));
    }

    #[test]
    fn docs_only_update_is_low_risk_with_no_verification_plan() {
        let planner = Planner::new(RiskShapingConfig::default());
        let plan = planner.plan(draft("update_docs", vec!["README.md"])).unwrap();
        assert_eq!(plan.risk_level_proposed, RiskLevel::Low);
        assert!(plan.verification_plan.is_empty());
        assert_eq!(plan.rollback_plan.len(), 1);
    }

    #[test]
    fn always_review_path_forces_high_risk_and_empty_rollback() {
        let config = RiskShapingConfig {
            always_review_paths: vec!["policy/**".into()],
        };
        let planner = Planner::new(config);
        let plan = planner.plan(draft("fix_bug", vec!["policy/default.yaml"])).unwrap();
        assert_eq!(plan.risk_level_proposed, RiskLevel::High);
        assert!(
            plan.rollback_plan.is_empty(),
            "high-risk plans get an empty rollback_plan so WriteGate requires approval"
        );
    }

    #[test]
    fn fix_bug_auto_populates_test_runner_and_file_exists_health_check() {
        let planner = Planner::new(RiskShapingConfig::default());
        let plan = planner.plan(draft("fix_bug", vec!["src/app.py"])).unwrap();
        assert_eq!(plan.verification_plan.len(), 1);
        assert_eq!(plan.health_checks.len(), 1);
        assert!(matches!(
            plan.health_checks[0],
            HealthCheckSpec::FileExists { .. }
        ));
    }

    #[test]
    fn explicit_fields_are_not_overwritten() {
        let planner = Planner::new(RiskShapingConfig::default());
        let mut d = draft("fix_bug", vec!["src/app.py"]);
        d.rollback_plan = vec!["custom rollback".into()];
        let plan = planner.plan(d).unwrap();
        assert_eq!(plan.rollback_plan, vec!["custom rollback".to_string()]);
    }
}
