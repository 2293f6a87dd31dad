// models.rs — row types for the `executions` and `execution_steps` tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lc_changeset::RiskLevel;
use lc_policy::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    RolledBack,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::RolledBack
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::RolledBack => "rolled_back",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => ExecutionStatus::Pending,
            "running" => ExecutionStatus::Running,
            "completed" => ExecutionStatus::Completed,
            "failed" => ExecutionStatus::Failed,
            "rolled_back" => ExecutionStatus::RolledBack,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Manual,
    Agent,
    Retry,
    Repair,
    Scheduled,
}

impl TriggerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerKind::Manual => "manual",
            TriggerKind::Agent => "agent",
            TriggerKind::Retry => "retry",
            TriggerKind::Repair => "repair",
            TriggerKind::Scheduled => "scheduled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "manual" => TriggerKind::Manual,
            "agent" => TriggerKind::Agent,
            "retry" => TriggerKind::Retry,
            "repair" => TriggerKind::Repair,
            "scheduled" => TriggerKind::Scheduled,
            _ => return None,
        })
    }
}

/// One row in `executions` — the system of record for a single apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub plan_id: Uuid,
    pub changeset_id: Uuid,
    pub decision_id: Uuid,
    pub checksum: String,
    pub verdict: Verdict,
    pub risk_level: RiskLevel,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub affected_paths: Vec<String>,
    pub artifact_path: String,
    pub verification_passed: Option<bool>,
    pub health_passed: Option<bool>,
    pub error_step: Option<String>,
    pub error_message: Option<String>,
    pub rolled_back: bool,
    pub correlation_id: String,
    pub parent_execution_id: Option<String>,
    pub trigger_kind: TriggerKind,
    pub is_repair: bool,
    pub repair_for_execution_id: Option<String>,
}

/// One row in `execution_steps` — durable per-step pipeline record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub execution_id: String,
    pub step_num: i64,
    pub step_name: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub log_ref: Option<String>,
}

/// A sign-off on a `NEED_APPROVAL` decision, recorded alongside executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredApproval {
    pub approval_id: Uuid,
    pub decision_id: Uuid,
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Aggregate counters returned by `get_statistics()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub total_executions: u64,
    pub by_status: std::collections::BTreeMap<String, u64>,
    pub by_verdict: std::collections::BTreeMap<String, u64>,
    pub by_risk_level: std::collections::BTreeMap<String, u64>,
    pub mean_duration_seconds: Option<f64>,
}

/// The shape returned by `get_execution_lineage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lineage {
    pub this: ExecutionRecord,
    pub ancestors: Vec<ExecutionRecord>,
    pub descendants: Vec<ExecutionRecord>,
    pub siblings: Vec<ExecutionRecord>,
}
