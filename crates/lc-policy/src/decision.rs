// decision.rs — GovernanceDecision: WriteGate's verdict plus the evidence
// trail needed to replay it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lc_changeset::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    NeedApproval,
    Deny,
}

/// One check's outcome, recorded in evaluation order regardless of whether
/// it was terminal, so a decision can always be explained from its trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationStep {
    pub check: String,
    pub outcome: String,
    pub terminal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceDecision {
    pub decision_id: Uuid,
    pub plan_id: Uuid,
    pub changeset_id: Uuid,
    pub verdict: Verdict,
    pub risk_level_effective: RiskLevel,
    pub reasons: Vec<String>,
    pub policy_snapshot_hash: String,
    pub reflection_hints_used: bool,
    pub hints_digest: Option<String>,
    pub trace: Vec<EvaluationStep>,
    pub created_at: DateTime<Utc>,
}

/// A human sign-off on a NEED_APPROVAL decision. Executor looks this up by
/// `decision_id` before accepting the decision's ChangeSet for apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceApproval {
    pub approval_id: Uuid,
    pub decision_id: Uuid,
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl GovernanceApproval {
    pub fn new(decision_id: Uuid, approved_by: impl Into<String>, note: Option<String>) -> Self {
        Self {
            approval_id: Uuid::new_v4(),
            decision_id,
            approved_by: approved_by.into(),
            approved_at: Utc::now(),
            note,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Verdict::NeedApproval).unwrap(),
            "\"need_approval\""
        );
    }
}
