// engine.rs — WriteGate: a deterministic policy judge.
//
// `evaluate` is a pure function of (plan, changeset, policy_snapshot,
// hints): four ordered checks, each appending to an `EvaluationTrace` the
// way `ta-policy::engine::PolicyEngine::evaluate_with_trace` builds its
// trace, so every decision can be explained after the fact. WriteGate
// never mutates the ChangeSet and never executes it — Executor re-runs
// the forbidden-path and checksum checks independently (defense in depth).

use uuid::Uuid;

use lc_changeset::{ChangePlan, ChangeSet, RiskLevel};

use crate::config::PolicyConfig;
use crate::decision::{EvaluationStep, GovernanceDecision, Verdict};
use crate::reflection_hints::ReflectionHintsRef;

pub fn evaluate(
    plan: &ChangePlan,
    changeset: &ChangeSet,
    policy: &PolicyConfig,
    hints: Option<&ReflectionHintsRef>,
) -> GovernanceDecision {
    let mut trace = Vec::new();
    let mut reasons = Vec::new();

    // 1. Checksum integrity.
    if !changeset.verify_checksum() {
        trace.push(EvaluationStep {
            check: "checksum_integrity".into(),
            outcome: "mismatch".into(),
            terminal: true,
        });
        reasons.push("checksum_mismatch".to_string());
        return finalize(
            plan,
            changeset,
            policy,
            Verdict::Deny,
            plan.risk_level_proposed,
            reasons,
            trace,
            false,
            None,
        );
    }
    trace.push(EvaluationStep {
        check: "checksum_integrity".into(),
        outcome: "ok".into(),
        terminal: false,
    });

    // 2a. Path traversal in the plan's declared affected paths. These are
    // free-text strings supplied by the Planner's reasoning tool — unlike
    // ChangeSet's FileChange paths (typed as lc_core::RelPath, which
    // reject traversal at construction), affected_paths is advisory and
    // must be independently checked, mirroring
    // `ta-policy::engine::contains_path_traversal`.
    if let Some(traversal) = first_traversal(&plan.affected_paths) {
        trace.push(EvaluationStep {
            check: "path_traversal".into(),
            outcome: format!("traversal:{traversal}"),
            terminal: true,
        });
        reasons.push(format!("path_violation: `{traversal}` contains path traversal"));
        return finalize(
            plan,
            changeset,
            policy,
            Verdict::Deny,
            plan.risk_level_proposed,
            reasons,
            trace,
            false,
            None,
        );
    }
    trace.push(EvaluationStep {
        check: "path_traversal".into(),
        outcome: "ok".into(),
        terminal: false,
    });

    // 2b. Forbidden paths.
    if let Some(matched) = first_forbidden_match(changeset, policy) {
        trace.push(EvaluationStep {
            check: "forbidden_paths".into(),
            outcome: format!("matched:{matched}"),
            terminal: true,
        });
        reasons.push(format!("path_violation: matched forbidden pattern `{matched}`"));
        return finalize(
            plan,
            changeset,
            policy,
            Verdict::Deny,
            plan.risk_level_proposed,
            reasons,
            trace,
            false,
            None,
        );
    }
    trace.push(EvaluationStep {
        check: "forbidden_paths".into(),
        outcome: "ok".into(),
        terminal: false,
    });

    // 3. Risk escalation.
    let (risk_effective, escalation_reasons) = escalate_risk(plan, changeset, policy);
    reasons.extend(escalation_reasons.clone());
    trace.push(EvaluationStep {
        check: "risk_escalation".into(),
        outcome: format!("{risk_effective:?}"),
        terminal: false,
    });

    // 4. Gating.
    let needs_review = changeset.affected_paths().iter().any(|p| matches_any(&policy.always_review_paths, p));
    let needs_approval = (risk_effective >= RiskLevel::Medium && plan.rollback_plan.is_empty()) || needs_review;
    if needs_review {
        reasons.push("path matches an always-review pattern".to_string());
    }
    if risk_effective >= RiskLevel::Medium && plan.rollback_plan.is_empty() {
        reasons.push("risk is medium or higher with no rollback plan".to_string());
    }

    let verdict = if needs_approval {
        Verdict::NeedApproval
    } else {
        Verdict::Allow
    };
    trace.push(EvaluationStep {
        check: "gating".into(),
        outcome: format!("{verdict:?}"),
        terminal: true,
    });

    let (hints_used, hints_digest) = if let Some(h) = hints {
        reasons.push(format!("reflection: {}", h.summary));
        (true, Some(h.digest.clone()))
    } else {
        (false, None)
    };

    finalize(
        plan,
        changeset,
        policy,
        verdict,
        risk_effective,
        reasons,
        trace,
        hints_used,
        hints_digest,
    )
}

fn finalize(
    plan: &ChangePlan,
    changeset: &ChangeSet,
    policy: &PolicyConfig,
    verdict: Verdict,
    risk_level_effective: RiskLevel,
    reasons: Vec<String>,
    trace: Vec<EvaluationStep>,
    reflection_hints_used: bool,
    hints_digest: Option<String>,
) -> GovernanceDecision {
    GovernanceDecision {
        decision_id: Uuid::new_v4(),
        plan_id: plan.plan_id,
        changeset_id: changeset.changeset_id,
        verdict,
        risk_level_effective,
        reasons,
        policy_snapshot_hash: policy.snapshot_hash(),
        reflection_hints_used,
        hints_digest,
        trace,
        created_at: chrono::Utc::now(),
    }
}

fn first_forbidden_match(changeset: &ChangeSet, policy: &PolicyConfig) -> Option<String> {
    for path in changeset.affected_paths() {
        for pattern in &policy.forbidden_paths {
            if let Ok(glob) = glob::Pattern::new(pattern) {
                if glob.matches(&path) {
                    return Some(pattern.clone());
                }
            }
            // An invalid pattern is a fail-closed configuration error: a
            // path that cannot be checked against it is treated as matching,
            // mirroring `ta-policy::engine::matches_resource_pattern`.
        }
    }
    None
}

fn matches_any(patterns: &[String], path: &str) -> bool {
    patterns.iter().any(|pattern| {
        glob::Pattern::new(pattern)
            .map(|g| g.matches(path))
            .unwrap_or(true)
    })
}

fn escalate_risk(plan: &ChangePlan, changeset: &ChangeSet, policy: &PolicyConfig) -> (RiskLevel, Vec<String>) {
    let mut risk = plan.risk_level_proposed;
    let mut reasons = Vec::new();

    if changeset.file_changes.len() > policy.max_files_touched {
        risk = risk.max(RiskLevel::High);
        reasons.push(format!(
            "touches {} files, exceeding the configured budget of {}",
            changeset.file_changes.len(),
            policy.max_files_touched
        ));
    }

    let patch_lines: usize = changeset
        .file_changes
        .iter()
        .filter_map(|fc| fc.new_content())
        .map(|content| content.lines().count())
        .sum();
    if patch_lines > policy.max_patch_lines {
        risk = risk.max(RiskLevel::High);
        reasons.push(format!(
            "changes {patch_lines} lines, exceeding the configured budget of {}",
            policy.max_patch_lines
        ));
    }

    for fc in &changeset.file_changes {
        if matches!(fc, lc_changeset::FileChange::Delete { .. }) {
            if let Some(escalated) = policy.risk_for_delete(fc.path().as_str()) {
                if escalated > risk {
                    risk = escalated;
                    reasons.push(format!(
                        "DELETE on `{}` is always-high-risk by policy",
                        fc.path()
                    ));
                }
            }
        }
    }

    for path in changeset.affected_paths() {
        if matches_any(&policy.always_review_paths, &path) && risk < RiskLevel::High {
            risk = RiskLevel::High;
            reasons.push(format!("`{path}` is under an always-review root"));
        }
    }

    (risk, reasons)
}
