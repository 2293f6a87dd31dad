// repair.rs — case-based repair synthesis: for a failed execution, find a
// similar prior failure whose correlation group eventually succeeded, and
// draft a `repair.json` pointing a human at that successful fix.
//
// The draft never contains guessed file content — GCEC has no way to know
// what bytes resolved the prior failure, only which execution did. It
// references evidence_execution_ids so a reviewer (or a new Planner-driven
// plan) can inspect the successful ChangeSet directly.

use serde::{Deserialize, Serialize};

use lc_store::{ExecutionRecord, ExecutionStatus, ExecutionStore};

use crate::error::ReflectionError;
use crate::similarity::{rank, ScoredExecution};

/// A human-reviewable suggestion that this failure resembles prior cases
/// that were eventually resolved, with pointers to the resolving execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairDraft {
    pub failed_execution_id: String,
    pub correlation_id: String,
    pub candidate_resolutions: Vec<RepairCandidate>,
    pub evidence_execution_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairCandidate {
    pub similar_failed_execution_id: String,
    pub similarity_score: f64,
    pub resolving_execution_id: String,
    pub resolving_affected_paths: Vec<String>,
}

/// Synthesize a repair draft for `failed_execution_id`: find similar prior
/// failures, and for each, walk its descendants for a completed execution
/// under the same correlation — that descendant is a candidate resolution.
pub fn synthesize_repair(
    store: &ExecutionStore,
    failed_execution_id: &str,
    limit: usize,
    min_similarity: f64,
) -> Result<RepairDraft, ReflectionError> {
    let failed = store
        .get(failed_execution_id)?
        .ok_or_else(|| ReflectionError::ExecutionNotFound {
            execution_id: failed_execution_id.to_string(),
        })?;

    let mut filters = lc_store::ListFilters::new();
    filters.limit = i64::MAX;
    let all = store.list(&filters)?;

    let similar: Vec<ScoredExecution> = rank(&failed, &all, limit * 4, min_similarity, true)
        .into_iter()
        .filter(|s| {
            all.iter()
                .find(|e| e.execution_id == s.execution_id)
                .map(|e| matches!(e.status, ExecutionStatus::Failed | ExecutionStatus::RolledBack))
                .unwrap_or(false)
        })
        .collect();

    let mut candidates = Vec::new();
    let mut evidence_ids = vec![failed_execution_id.to_string()];

    for scored in similar {
        if candidates.len() >= limit {
            break;
        }
        if let Some(resolution) = find_resolution(store, &scored.execution_id)? {
            evidence_ids.push(scored.execution_id.clone());
            evidence_ids.push(resolution.execution_id.clone());
            candidates.push(RepairCandidate {
                similar_failed_execution_id: scored.execution_id,
                similarity_score: scored.score,
                resolving_execution_id: resolution.execution_id,
                resolving_affected_paths: resolution.affected_paths,
            });
        }
    }

    Ok(RepairDraft {
        failed_execution_id: failed_execution_id.to_string(),
        correlation_id: failed.correlation_id,
        candidate_resolutions: candidates,
        evidence_execution_ids: evidence_ids,
    })
}

/// Walk the failure's descendants (same correlation, since lineage is
/// scoped to `parent_execution_id`) for the first completed execution.
fn find_resolution(store: &ExecutionStore, failed_execution_id: &str) -> Result<Option<ExecutionRecord>, ReflectionError> {
    let lineage = store.get_lineage(failed_execution_id, 20)?;
    Ok(lineage
        .descendants
        .into_iter()
        .find(|d| d.status == ExecutionStatus::Completed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lc_changeset::RiskLevel;
    use lc_policy::Verdict;
    use lc_store::TriggerKind;
    use uuid::Uuid;

    fn record(id: &str, correlation_id: &str, parent: Option<&str>, status: ExecutionStatus, error: Option<&str>) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: id.to_string(),
            plan_id: Uuid::new_v4(),
            changeset_id: Uuid::new_v4(),
            decision_id: Uuid::new_v4(),
            checksum: "x".into(),
            verdict: Verdict::Allow,
            risk_level: RiskLevel::Medium,
            status,
            started_at: Utc::now(),
            completed_at: None,
            affected_paths: vec!["src/app.py".into()],
            artifact_path: format!(".lonelycat/executions/{id}"),
            verification_passed: None,
            health_passed: None,
            error_step: Some("verify".into()),
            error_message: error.map(String::from),
            rolled_back: false,
            correlation_id: correlation_id.to_string(),
            parent_execution_id: parent.map(String::from),
            trigger_kind: TriggerKind::Agent,
            is_repair: false,
            repair_for_execution_id: None,
        }
    }

    #[test]
    fn synthesize_repair_finds_resolved_similar_case() {
        let store = ExecutionStore::open_in_memory().unwrap();

        store
            .insert_pending(&record("prior-fail", "corr-prior", None, ExecutionStatus::Failed, Some("timeout")))
            .unwrap();
        store
            .insert_pending(&record(
                "prior-fix",
                "corr-prior",
                Some("prior-fail"),
                ExecutionStatus::Completed,
                None,
            ))
            .unwrap();

        store
            .insert_pending(&record("current-fail", "corr-current", None, ExecutionStatus::Failed, Some("timeout")))
            .unwrap();

        let draft = synthesize_repair(&store, "current-fail", 5, 0.0).unwrap();
        assert_eq!(draft.failed_execution_id, "current-fail");
        assert_eq!(draft.candidate_resolutions.len(), 1);
        assert_eq!(draft.candidate_resolutions[0].resolving_execution_id, "prior-fix");
    }

    #[test]
    fn synthesize_repair_errors_for_unknown_execution() {
        let store = ExecutionStore::open_in_memory().unwrap();
        let result = synthesize_repair(&store, "ghost", 5, 0.0);
        assert!(matches!(result, Err(ReflectionError::ExecutionNotFound { .. })));
    }

    #[test]
    fn synthesize_repair_returns_no_candidates_when_nothing_resolved() {
        let store = ExecutionStore::open_in_memory().unwrap();
        store
            .insert_pending(&record("current-fail", "corr-current", None, ExecutionStatus::Failed, Some("timeout")))
            .unwrap();
        let draft = synthesize_repair(&store, "current-fail", 5, 0.0).unwrap();
        assert!(draft.candidate_resolutions.is_empty());
    }
}
