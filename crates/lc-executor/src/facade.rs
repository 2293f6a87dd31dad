// facade.rs — Gcec: the single object surrounding systems talk to. It ties
// together Lock Manager, Idempotency Manager, Execution Store, Artifact
// Store, the apply pipeline, and Similarity & Reflection behind the
// boundary operations of spec §6 (submit/list/get/events/lineage/
// correlation/similar/replay/stats), the only global mutable state being
// the workspace root and the lazily opened store connection — both
// immutable after `Gcec::open`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use lc_artifacts::ArtifactStore;
use lc_changeset::{ChangePlan, ChangeSet};
use lc_core::ErrorCode;
use lc_lock::LockManager;
use lc_policy::{GovernanceApproval, GovernanceDecision, PolicyConfig, Verdict};
use lc_reflection::{self, ReflectionHints, RepairDraft, ScoredExecution};
use lc_store::{ExecutionRecord, ExecutionStatus, ExecutionStore, Lineage, ListFilters, Statistics, TriggerKind};

use crate::error::ExecutorError;
use crate::idempotency::{self, IdempotencyOutcome, DEFAULT_TTL};
use crate::pipeline;
use crate::result::ExecutionResult;

/// Default wall-clock budget for one pipeline run (§5).
pub const DEFAULT_PIPELINE_TIMEOUT: Duration = Duration::from_secs(300);
/// Default timeout for acquiring the repo lock (§4.4).
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(600);

/// Optional lineage metadata a caller attaches to a submission — root
/// executions leave this `None` and get `correlation_id = execution_id`;
/// retries/repairs set it to inherit the root's correlation.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    pub trigger_kind: TriggerKind,
    pub parent_execution_id: Option<String>,
    pub correlation_id: Option<String>,
    pub is_repair: bool,
    pub repair_for_execution_id: Option<String>,
}

impl SubmitOptions {
    pub fn manual() -> Self {
        Self {
            trigger_kind: TriggerKind::Manual,
            ..Default::default()
        }
    }

    pub fn retry_of(parent: &ExecutionRecord) -> Self {
        Self {
            trigger_kind: TriggerKind::Retry,
            parent_execution_id: Some(parent.execution_id.clone()),
            correlation_id: Some(parent.correlation_id.clone()),
            ..Default::default()
        }
    }

    pub fn repair_of(parent: &ExecutionRecord) -> Self {
        Self {
            trigger_kind: TriggerKind::Repair,
            parent_execution_id: Some(parent.execution_id.clone()),
            correlation_id: Some(parent.correlation_id.clone()),
            is_repair: true,
            repair_for_execution_id: Some(parent.execution_id.clone()),
        }
    }
}

/// Summary returned by `get_execution` and `list_executions`: the
/// persisted row plus its step log and artifact path, i.e. everything a
/// caller outside the core needs without reaching into the artifact
/// directory itself.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionSummary {
    pub record: ExecutionRecord,
    pub steps: Vec<lc_store::ExecutionStep>,
}

/// The Governed Change Execution Core facade. One instance per workspace;
/// holds the workspace root, the lock manager, the (lazily-opened)
/// execution store connection, and an `ArtifactStore` handle — all
/// immutable after construction.
pub struct Gcec {
    workspace_root: PathBuf,
    lock: LockManager,
    store: ExecutionStore,
    artifacts: ArtifactStore,
    policy: PolicyConfig,
    pipeline_timeout: Duration,
    lock_timeout: Duration,
}

impl Gcec {
    /// Open (creating if absent) the execution store at
    /// `<workspace_root>/.lonelycat/executor.db`, running all pending
    /// migrations, and wire up the lock manager and artifact store scoped
    /// to the same workspace.
    pub fn open(workspace_root: impl AsRef<Path>, policy: PolicyConfig) -> Result<Self, ExecutorError> {
        let workspace_root = workspace_root.as_ref().to_path_buf();
        let db_path = workspace_root.join(".lonelycat").join("executor.db");
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ExecutorError::ApplyFailed {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let store = ExecutionStore::open(&db_path)?;
        let artifacts = ArtifactStore::new(&workspace_root);
        let lock = LockManager::new(&workspace_root);
        Ok(Self {
            workspace_root,
            lock,
            store,
            artifacts,
            policy,
            pipeline_timeout: DEFAULT_PIPELINE_TIMEOUT,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    pub fn with_pipeline_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline_timeout = timeout;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn store(&self) -> &ExecutionStore {
        &self.store
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Record a human sign-off on a `NEED_APPROVAL` decision so `submit`
    /// will accept it.
    pub fn approve(
        &self,
        decision_id: Uuid,
        approved_by: impl Into<String>,
        note: Option<String>,
    ) -> Result<GovernanceApproval, ExecutorError> {
        let approval = GovernanceApproval::new(decision_id, approved_by, note);
        self.store.record_approval(&approval)?;
        Ok(approval)
    }

    /// §6 `submit(plan, changeset, decision) -> ExecutionResult`. Computes
    /// the deterministic `execution_id`, resolves idempotency, acquires the
    /// repo lock, and (only then) runs the apply pipeline.
    pub fn submit(
        &self,
        plan: &ChangePlan,
        changeset: &ChangeSet,
        decision: &GovernanceDecision,
        options: SubmitOptions,
    ) -> Result<ExecutionResult, ExecutorError> {
        let execution_id = idempotency::execution_id(plan.plan_id, &changeset.checksum);

        match idempotency::check(&self.store, &execution_id, DEFAULT_TTL)? {
            IdempotencyOutcome::Cached(result) => return Ok(result),
            IdempotencyOutcome::InFlight => {
                // Fall through to lock acquisition: the in-flight owner
                // holds the lock, so we block here until it releases and
                // then re-check idempotency before (not) re-applying.
            }
            IdempotencyOutcome::Proceed => {}
        }

        let guard = self.lock.acquire(&execution_id, plan.plan_id, self.lock_timeout)?;

        // Re-check under the lock: another thread may have completed the
        // same (plan_id, checksum) while we were waiting to acquire it.
        if let IdempotencyOutcome::Cached(result) = idempotency::check(&self.store, &execution_id, DEFAULT_TTL)? {
            drop(guard);
            return Ok(result);
        }

        let approved = match decision.verdict {
            Verdict::Allow => true,
            Verdict::NeedApproval => self.store.has_approval(decision.decision_id)?,
            Verdict::Deny => false,
        };

        let correlation_id = options
            .correlation_id
            .clone()
            .unwrap_or_else(|| execution_id.clone());

        let record = ExecutionRecord {
            execution_id: execution_id.clone(),
            plan_id: plan.plan_id,
            changeset_id: changeset.changeset_id,
            decision_id: decision.decision_id,
            checksum: changeset.checksum.clone(),
            verdict: decision.verdict,
            risk_level: decision.risk_level_effective,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            affected_paths: changeset.affected_paths(),
            artifact_path: self.artifacts.execution_dir(&execution_id).display().to_string(),
            verification_passed: None,
            health_passed: None,
            error_step: None,
            error_message: None,
            rolled_back: false,
            correlation_id,
            parent_execution_id: options.parent_execution_id.clone(),
            trigger_kind: options.trigger_kind,
            is_repair: options.is_repair,
            repair_for_execution_id: options.repair_for_execution_id.clone(),
        };
        self.store.insert_pending(&record)?;

        self.artifacts.ensure_dir(&execution_id)?;
        self.artifacts.write_piece(&execution_id, "plan", plan)?;
        self.artifacts.write_piece(&execution_id, "changeset", changeset)?;
        self.artifacts.write_piece(&execution_id, "decision", decision)?;

        let result = if !approved {
            ExecutionResult::failed(
                &execution_id,
                record.artifact_path.clone(),
                ErrorCode::NotApproved,
                "validate",
                format!("decision {} is not approved", decision.decision_id),
                false,
            )
        } else {
            pipeline::run(
                &self.workspace_root,
                &self.artifacts,
                &self.store,
                &self.policy,
                &execution_id,
                plan,
                changeset,
                decision,
                approved,
                self.pipeline_timeout,
            )
        };

        self.finalize(&record, &result)?;
        drop(guard);
        Ok(result)
    }

    fn finalize(&self, started: &ExecutionRecord, result: &ExecutionResult) -> Result<(), ExecutorError> {
        let mut record = started.clone();
        record.status = result.status;
        record.completed_at = Some(Utc::now());
        record.verification_passed = result.verification_passed;
        record.health_passed = result.health_passed;
        record.error_step = result.error_step.clone();
        record.error_message = result.error_message.clone();
        record.rolled_back = result.rolled_back;
        self.store.update(&record)?;
        self.artifacts.write_piece(&record.execution_id, "execution", &record)?;
        Ok(())
    }

    /// §6 `list_executions(filters, pagination) -> summaries`.
    pub fn list_executions(&self, filters: &ListFilters) -> Result<Vec<ExecutionRecord>, ExecutorError> {
        Ok(self.store.list(filters)?)
    }

    /// §6 `get_execution(execution_id) -> summary + steps + artifact path`.
    pub fn get_execution(&self, execution_id: &str) -> Result<Option<ExecutionSummary>, ExecutorError> {
        let Some(record) = self.store.get(execution_id)? else {
            return Ok(None);
        };
        let steps = self.store.list_steps(execution_id)?;
        Ok(Some(ExecutionSummary { record, steps }))
    }

    /// §6 `get_execution_events(execution_id, tail=N) -> recent events`.
    pub fn get_execution_events(
        &self,
        execution_id: &str,
        tail: usize,
    ) -> Result<Vec<lc_artifacts::StepEvent>, ExecutorError> {
        Ok(self.artifacts.tail_events(execution_id, tail)?)
    }

    /// §6 `get_execution_lineage(execution_id, depth) -> {self, ancestors, descendants, siblings}`.
    pub fn get_execution_lineage(&self, execution_id: &str, depth_limit: usize) -> Result<Lineage, ExecutorError> {
        Ok(self.store.get_lineage(execution_id, depth_limit)?)
    }

    /// §6 `list_executions_by_correlation(correlation_id) -> tree`.
    pub fn list_executions_by_correlation(&self, correlation_id: &str) -> Result<Vec<ExecutionRecord>, ExecutorError> {
        Ok(self.store.list_by_correlation(correlation_id)?)
    }

    /// Look up `execution_id` and every candidate it could be compared
    /// against, shared by the combined/error-only/path-only variants below.
    fn similarity_inputs(
        &self,
        execution_id: &str,
    ) -> Result<(ExecutionRecord, Vec<ExecutionRecord>), ExecutorError> {
        let Some(query) = self.store.get(execution_id)? else {
            return Err(ExecutorError::InvalidInput(format!(
                "no execution `{execution_id}` to compare against"
            )));
        };
        let mut filters = ListFilters::new();
        filters.limit = i64::MAX;
        let candidates = self.store.list(&filters)?;
        Ok((query, candidates))
    }

    /// §6 `find_similar_executions(execution_id, limit, min_similarity) -> scored neighbors`,
    /// the combined error+path+metadata score.
    pub fn find_similar_executions(
        &self,
        execution_id: &str,
        limit: usize,
        min_similarity: f64,
        exclude_same_correlation: bool,
    ) -> Result<Vec<ScoredExecution>, ExecutorError> {
        let (query, candidates) = self.similarity_inputs(execution_id)?;
        Ok(lc_reflection::rank(&query, &candidates, limit, min_similarity, exclude_same_correlation))
    }

    /// §4.9's error-only variant: cosine similarity over error text alone,
    /// ignoring which paths were touched — "has this failure mode happened
    /// before, anywhere in the workspace."
    pub fn find_similar_executions_by_error(
        &self,
        execution_id: &str,
        limit: usize,
        min_similarity: f64,
        exclude_same_correlation: bool,
    ) -> Result<Vec<ScoredExecution>, ExecutorError> {
        let (query, candidates) = self.similarity_inputs(execution_id)?;
        Ok(lc_reflection::rank_by_error(
            &query,
            &candidates,
            limit,
            min_similarity,
            exclude_same_correlation,
        ))
    }

    /// §4.9's path-only variant: Jaccard similarity over affected paths
    /// alone, ignoring error text — "has this area of the workspace been
    /// touched before, regardless of outcome."
    pub fn find_similar_executions_by_paths(
        &self,
        execution_id: &str,
        limit: usize,
        min_similarity: f64,
        exclude_same_correlation: bool,
    ) -> Result<Vec<ScoredExecution>, ExecutorError> {
        let (query, candidates) = self.similarity_inputs(execution_id)?;
        Ok(lc_reflection::rank_by_paths(
            &query,
            &candidates,
            limit,
            min_similarity,
            exclude_same_correlation,
        ))
    }

    /// §6 `replay_execution(execution_id) -> synthesized summary`. Rebuilds
    /// a summary purely from the four-piece artifact set, independent of
    /// the store, so the round-trip law in §8 (`replay_execution` ==
    /// `get_execution`) can be checked without touching SQLite.
    pub fn replay_execution(&self, execution_id: &str) -> Result<ReplaySummary, ExecutorError> {
        let plan: ChangePlan = self.artifacts.read_piece(execution_id, "plan")?;
        let changeset: ChangeSet = self.artifacts.read_piece(execution_id, "changeset")?;
        let decision: GovernanceDecision = self.artifacts.read_piece(execution_id, "decision")?;
        let execution: ExecutionRecord = self.artifacts.read_piece(execution_id, "execution")?;
        Ok(ReplaySummary {
            plan,
            changeset,
            decision,
            execution,
        })
    }

    /// §6 `get_statistics() -> aggregated counters`.
    pub fn get_statistics(&self) -> Result<Statistics, ExecutorError> {
        Ok(self.store.get_statistics()?)
    }

    /// Offline reflection analysis over the whole store (§4.9). Not itself
    /// a §6 boundary operation, but the producer of the
    /// `reflection/hints_7d.json` artifact and of the hints WriteGate may
    /// optionally consume.
    pub fn build_reflection_hints(&self, window_days: i64) -> Result<ReflectionHints, ExecutorError> {
        Ok(lc_reflection::build_hints(&self.store, window_days)?)
    }

    /// Case-based repair synthesis (§4.9) for a failed execution.
    pub fn synthesize_repair(
        &self,
        failed_execution_id: &str,
        limit: usize,
        min_similarity: f64,
    ) -> Result<RepairDraft, ExecutorError> {
        Ok(lc_reflection::synthesize_repair(&self.store, failed_execution_id, limit, min_similarity)?)
    }
}

/// The object reconstructed by `replay_execution` purely from the
/// four-piece artifact set.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReplaySummary {
    pub plan: ChangePlan,
    pub changeset: ChangeSet,
    pub decision: GovernanceDecision,
    pub execution: ExecutionRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc_changeset::file_change::create;
    use lc_changeset::RiskLevel;
    use lc_core::path::RelPath;
    use lc_policy::PolicyConfig;

    fn decision_for(plan: &ChangePlan, changeset: &ChangeSet) -> GovernanceDecision {
        lc_policy::evaluate(plan, changeset, &PolicyConfig::default(), None)
    }

    #[test]
    fn submit_applies_once_and_replays_identically() {
        let dir = tempfile::tempdir().unwrap();
        let gcec = Gcec::open(dir.path(), PolicyConfig::default()).unwrap();

        let plan = ChangePlan::new("fix_bug", "fix", "why", vec!["a.txt".into()], RiskLevel::Low, "agent-1");
        let changeset = ChangeSet::new(vec![create(RelPath::new("a.txt").unwrap(), "hi")]).unwrap();
        let decision = decision_for(&plan, &changeset);
        assert_eq!(decision.verdict, Verdict::Allow);

        let result = gcec.submit(&plan, &changeset, &decision, SubmitOptions::manual()).unwrap();
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hi");

        let summary = gcec.get_execution(&result.execution_id).unwrap().unwrap();
        assert_eq!(summary.record.status, ExecutionStatus::Completed);

        let replay = gcec.replay_execution(&result.execution_id).unwrap();
        assert_eq!(replay.execution.status, summary.record.status);
        assert_eq!(replay.changeset.checksum, changeset.checksum);
    }

    #[test]
    fn resubmitting_same_plan_and_checksum_returns_cached_result() {
        let dir = tempfile::tempdir().unwrap();
        let gcec = Gcec::open(dir.path(), PolicyConfig::default()).unwrap();

        let plan = ChangePlan::new("fix_bug", "fix", "why", vec!["a.txt".into()], RiskLevel::Low, "agent-1");
        let changeset = ChangeSet::new(vec![create(RelPath::new("a.txt").unwrap(), "hi")]).unwrap();
        let decision = decision_for(&plan, &changeset);

        let first = gcec.submit(&plan, &changeset, &decision, SubmitOptions::manual()).unwrap();
        let second = gcec.submit(&plan, &changeset, &decision, SubmitOptions::manual()).unwrap();
        assert_eq!(first.execution_id, second.execution_id);
        assert_eq!(second.status, ExecutionStatus::Completed);

        let stats = gcec.get_statistics().unwrap();
        assert_eq!(stats.total_executions, 1);
    }

    #[test]
    fn need_approval_without_approval_record_fails_not_approved() {
        let dir = tempfile::tempdir().unwrap();
        let mut policy = PolicyConfig::default();
        policy.always_review_paths.push("agent/policies/*".into());
        let gcec = Gcec::open(dir.path(), policy.clone()).unwrap();

        let plan = ChangePlan::new(
            "fix_bug",
            "fix",
            "why",
            vec!["agent/policies/default.yaml".into()],
            RiskLevel::Low,
            "agent-1",
        );
        let changeset = ChangeSet::new(vec![create(RelPath::new("agent/policies/default.yaml").unwrap(), "x")]).unwrap();
        let decision = lc_policy::evaluate(&plan, &changeset, &policy, None);
        assert_eq!(decision.verdict, Verdict::NeedApproval);

        let result = gcec.submit(&plan, &changeset, &decision, SubmitOptions::manual()).unwrap();
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert_eq!(result.error_code, Some(ErrorCode::NotApproved));
    }

    #[test]
    fn approval_then_resubmit_applies() {
        let dir = tempfile::tempdir().unwrap();
        let mut policy = PolicyConfig::default();
        policy.always_review_paths.push("agent/policies/*".into());
        let gcec = Gcec::open(dir.path(), policy.clone()).unwrap();

        let plan = ChangePlan::new(
            "fix_bug",
            "fix",
            "why",
            vec!["agent/policies/default.yaml".into()],
            RiskLevel::Low,
            "agent-1",
        );
        let changeset = ChangeSet::new(vec![create(RelPath::new("agent/policies/default.yaml").unwrap(), "x")]).unwrap();
        let decision = lc_policy::evaluate(&plan, &changeset, &policy, None);

        gcec.approve(decision.decision_id, "reviewer", None).unwrap();
        let result = gcec.submit(&plan, &changeset, &decision, SubmitOptions::manual()).unwrap();
        assert_eq!(result.status, ExecutionStatus::Completed);
    }
}
