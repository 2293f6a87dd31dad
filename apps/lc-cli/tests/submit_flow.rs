// submit_flow.rs — end-to-end integration test for the plan → changeset →
// decision → submit flow the `lc submit` subcommand drives, exercised
// directly against the library crates `lc` wraps (mirrors `ta-cli`'s
// `tests/overlay_flow.rs`, which tests the underlying workspace/goal flow
// rather than shelling out to the built binary).

use std::fs;

use lc_changeset::file_change::create;
use lc_changeset::{ChangePlan, ChangeSet, RiskLevel};
use lc_core::path::RelPath;
use lc_executor::{Gcec, SubmitOptions};
use lc_policy::{PolicyConfig, Verdict};
use lc_store::ExecutionStatus;
use tempfile::TempDir;

#[test]
fn plan_to_submit_applies_and_is_queryable() {
    let workspace = TempDir::new().unwrap();
    let gcec = Gcec::open(workspace.path(), PolicyConfig::default()).unwrap();

    let plan = ChangePlan::new(
        "fix_bug",
        "fix the off-by-one",
        "index overran the buffer",
        vec!["src/app.py".into()],
        RiskLevel::Low,
        "agent-1",
    );
    let changeset = ChangeSet::new(vec![create(RelPath::new("src/app.py").unwrap(), "print('fixed')\n")]).unwrap();
    let decision = lc_policy::evaluate(&plan, &changeset, &PolicyConfig::default(), None);
    assert_eq!(decision.verdict, Verdict::Allow);

    let result = gcec
        .submit(&plan, &changeset, &decision, SubmitOptions::manual())
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(
        fs::read_to_string(workspace.path().join("src/app.py")).unwrap(),
        "print('fixed')\n"
    );

    let summary = gcec.get_execution(&result.execution_id).unwrap().unwrap();
    assert_eq!(summary.steps.len(), 6, "validate/backup/apply/verify/health/record");
    assert!(summary.steps.iter().all(|s| s.status == ExecutionStatus::Completed));

    let events = gcec.get_execution_events(&result.execution_id, 100).unwrap();
    assert!(!events.is_empty());

    let stats = gcec.get_statistics().unwrap();
    assert_eq!(stats.total_executions, 1);
}

#[test]
fn forbidden_path_is_denied_and_workspace_is_untouched() {
    let workspace = TempDir::new().unwrap();
    let gcec = Gcec::open(workspace.path(), PolicyConfig::default()).unwrap();

    let plan = ChangePlan::new(
        "fix_bug",
        "steal a secret",
        "n/a",
        vec![".env".into()],
        RiskLevel::Low,
        "agent-1",
    );
    let changeset = ChangeSet::new(vec![create(RelPath::new(".env").unwrap(), "SECRET=1")]).unwrap();
    let decision = lc_policy::evaluate(&plan, &changeset, &PolicyConfig::default(), None);
    assert_eq!(decision.verdict, Verdict::Deny);
    assert!(decision.reasons.iter().any(|r| r.contains("forbidden")));

    let result = gcec
        .submit(&plan, &changeset, &decision, SubmitOptions::manual())
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert!(!workspace.path().join(".env").exists());
}

#[test]
fn retry_inherits_correlation_from_parent() {
    let workspace = TempDir::new().unwrap();
    let gcec = Gcec::open(workspace.path(), PolicyConfig::default()).unwrap();

    let plan = ChangePlan::new(
        "fix_bug",
        "break then fix",
        "n/a",
        vec!["a.txt".into()],
        RiskLevel::Low,
        "agent-1",
    );
    let bad = ChangeSet::new(vec![create(RelPath::new("a.txt").unwrap(), "v1")]).unwrap();
    let decision = lc_policy::evaluate(&plan, &bad, &PolicyConfig::default(), None);
    let root = gcec
        .submit(&plan, &bad, &decision, SubmitOptions::manual())
        .unwrap();
    let root_record = gcec.get_execution(&root.execution_id).unwrap().unwrap().record;

    let retry_changeset = ChangeSet::new(vec![create(RelPath::new("b.txt").unwrap(), "v2")]).unwrap();
    let retry_decision = lc_policy::evaluate(&plan, &retry_changeset, &PolicyConfig::default(), None);
    let retry = gcec
        .submit(&plan, &retry_changeset, &retry_decision, SubmitOptions::retry_of(&root_record))
        .unwrap();

    let lineage = gcec.get_execution_lineage(&retry.execution_id, 20).unwrap();
    assert_eq!(lineage.ancestors.len(), 1);
    assert_eq!(lineage.ancestors[0].execution_id, root.execution_id);
    assert_eq!(lineage.this.correlation_id, root_record.correlation_id);
}
