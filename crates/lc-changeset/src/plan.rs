// plan.rs — ChangePlan: the structured intent a Planner hands to WriteGate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::health::HealthCheckSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// A verification-plan entry: a named, policy-controlled command to run
/// post-apply. The argv is never inlined here — only a profile name — so
/// a ChangePlan cannot smuggle an arbitrary command through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationStep {
    CommandProfile { profile_name: String },
    TestRunner { profile_name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePlan {
    pub plan_id: Uuid,
    pub intent: String,
    pub objective: String,
    pub rationale: String,
    pub affected_paths: Vec<String>,
    pub risk_level_proposed: RiskLevel,
    pub rollback_plan: Vec<String>,
    pub verification_plan: Vec<VerificationStep>,
    pub health_checks: Vec<HealthCheckSpec>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl ChangePlan {
    pub fn new(
        intent: impl Into<String>,
        objective: impl Into<String>,
        rationale: impl Into<String>,
        affected_paths: Vec<String>,
        risk_level_proposed: RiskLevel,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            plan_id: Uuid::new_v4(),
            intent: intent.into(),
            objective: objective.into(),
            rationale: rationale.into(),
            affected_paths,
            risk_level_proposed,
            rollback_plan: Vec::new(),
            verification_plan: Vec::new(),
            health_checks: Vec::new(),
            created_at: Utc::now(),
            created_by: created_by.into(),
        }
    }

    pub fn with_rollback_plan(mut self, steps: Vec<String>) -> Self {
        self.rollback_plan = steps;
        self
    }

    pub fn with_verification_plan(mut self, steps: Vec<VerificationStep>) -> Self {
        self.verification_plan = steps;
        self
    }

    pub fn with_health_checks(mut self, checks: Vec<HealthCheckSpec>) -> Self {
        self.health_checks = checks;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_orders_low_to_critical() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn builder_methods_set_plan_fields() {
        let plan = ChangePlan::new(
            "fix_bug",
            "fix the thing",
            "it was broken",
            vec!["src/app.py".into()],
            RiskLevel::Low,
            "agent-1",
        )
        .with_rollback_plan(vec!["restore src/app.py from backup".into()]);
        assert_eq!(plan.rollback_plan.len(), 1);
        assert_eq!(plan.risk_level_proposed, RiskLevel::Low);
    }

    #[test]
    fn risk_level_serializes_snake_case() {
        let json = serde_json::to_string(&RiskLevel::High).unwrap();
        assert_eq!(json, "\"high\"");
    }
}
