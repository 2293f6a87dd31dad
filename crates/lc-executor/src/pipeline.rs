// pipeline.rs — the durable validate/backup/apply/verify/health/record
// sequence. Every step is logged before and after it runs (`ArtifactStore`
// step log + hash-chained event) and mirrored into the `execution_steps`
// table, so a crash mid-pipeline leaves a readable trail of exactly how far
// it got.
//
// Grounded on the `other_examples` file `BLEEP-V1::DeterministicExecutor`
// for the snapshot-before-mutate / reverse-order-rollback shape, adapted
// from an in-memory `state_snapshots` map to `ArtifactStore`'s on-disk
// `backups/` directory.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;

use lc_artifacts::events::StepEvent;
use lc_artifacts::ArtifactStore;
use lc_changeset::{ChangePlan, ChangeSet};
use lc_policy::GovernanceDecision;
use lc_store::{ExecutionStatus, ExecutionStep, ExecutionStore};

use crate::applier::{self, Applied};
use crate::error::ExecutorError;
use crate::health;
use crate::result::ExecutionResult;
use crate::rollback;
use crate::verifier;

struct StepRecorder<'a> {
    artifacts: &'a ArtifactStore,
    store: &'a ExecutionStore,
    execution_id: &'a str,
    step_num: u32,
}

impl<'a> StepRecorder<'a> {
    fn run<T>(
        &mut self,
        name: &str,
        body: impl FnOnce() -> Result<T, ExecutorError>,
    ) -> Result<T, ExecutorError> {
        let step_num = self.step_num;
        self.step_num += 1;
        let started_at = Utc::now();
        let start = Instant::now();

        let _ = self.artifacts.append_event(self.execution_id, StepEvent::start(name));
        let _ = self.store.upsert_step(&ExecutionStep {
            execution_id: self.execution_id.to_string(),
            step_num: step_num as i64,
            step_name: name.to_string(),
            status: ExecutionStatus::Running,
            started_at,
            ended_at: None,
            error_code: None,
            error_message: None,
            log_ref: None,
        });

        let outcome = body();
        let duration = start.elapsed().as_secs_f64();
        let log_ref = self
            .artifacts
            .step_log_path(self.execution_id, step_num, name)
            .display()
            .to_string();

        match &outcome {
            Ok(_) => {
                let _ = self.artifacts.write_step_log(self.execution_id, step_num, name, "ok\n");
                let _ = self.artifacts.append_event(
                    self.execution_id,
                    StepEvent::end(name, "ok", duration, None),
                );
                let _ = self.store.upsert_step(&ExecutionStep {
                    execution_id: self.execution_id.to_string(),
                    step_num: step_num as i64,
                    step_name: name.to_string(),
                    status: ExecutionStatus::Completed,
                    started_at,
                    ended_at: Some(Utc::now()),
                    error_code: None,
                    error_message: None,
                    log_ref: Some(log_ref),
                });
            }
            Err(err) => {
                let code = err.code().to_string();
                let _ = self
                    .artifacts
                    .write_step_log(self.execution_id, step_num, name, &format!("error: {err}\n"));
                let _ = self.artifacts.append_event(
                    self.execution_id,
                    StepEvent::end(name, "failed", duration, Some(code.clone())),
                );
                let _ = self.store.upsert_step(&ExecutionStep {
                    execution_id: self.execution_id.to_string(),
                    step_num: step_num as i64,
                    step_name: name.to_string(),
                    status: ExecutionStatus::Failed,
                    started_at,
                    ended_at: Some(Utc::now()),
                    error_code: Some(code),
                    error_message: Some(err.to_string()),
                    log_ref: Some(log_ref),
                });
            }
        }
        outcome
    }
}

/// Run the full validate → backup/apply → verify → health → record
/// pipeline for an already-governed plan/changeset, under an already
/// acquired execution lock. `approved` resolves §4.3's precondition
/// (`decision.verdict = ALLOW`, or `NEED_APPROVAL` with a recorded
/// approval) — the caller looks that up via the execution store before
/// entering the pipeline, since it is a one-time check, not a pipeline
/// step in its own right.
#[allow(clippy::too_many_arguments)]
pub fn run(
    workspace_root: &Path,
    artifacts: &ArtifactStore,
    store: &ExecutionStore,
    policy: &lc_policy::PolicyConfig,
    execution_id: &str,
    plan: &ChangePlan,
    changeset: &ChangeSet,
    decision: &GovernanceDecision,
    approved: bool,
    pipeline_timeout: Duration,
) -> ExecutionResult {
    let artifact_path = artifacts.execution_dir(execution_id).display().to_string();
    let pipeline_start = Instant::now();
    let mut recorder = StepRecorder {
        artifacts,
        store,
        execution_id,
        step_num: 0,
    };

    let validation = recorder.run("validate", || {
        validate(workspace_root, policy, changeset, decision, approved)
    });
    if let Err(err) = validation {
        return fail_no_rollback(execution_id, &artifact_path, "validate", &err);
    }

    let backup_result = recorder.run("backup", || applier::precheck(workspace_root, &changeset.file_changes));
    if let Err(err) = backup_result {
        return fail_no_rollback(execution_id, &artifact_path, "backup", &err);
    }

    let mut applied: Vec<Applied> = Vec::new();
    let apply_result = recorder.run("apply", || {
        let (done, err) = applier::apply_all(workspace_root, artifacts, execution_id, &changeset.file_changes);
        applied = done;
        match err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    });
    if let Err(err) = apply_result {
        return roll_back_and_fail(workspace_root, artifacts, execution_id, &artifact_path, &applied, &err);
    }

    if pipeline_start.elapsed() > pipeline_timeout {
        let err = ExecutorError::Timeout {
            step: "apply".to_string(),
            elapsed_secs: pipeline_start.elapsed().as_secs(),
        };
        return roll_back_and_fail(workspace_root, artifacts, execution_id, &artifact_path, &applied, &err);
    }

    let verify_result = recorder.run("verify", || {
        verifier::verify(&plan.verification_plan, &policy.command_profiles).map(|_| ())
    });
    if let Err(err) = verify_result {
        return roll_back_and_fail(workspace_root, artifacts, execution_id, &artifact_path, &applied, &err);
    }

    let health_results = recorder.run("health", || {
        let results = health::check_all(&plan.health_checks, workspace_root, &policy.command_profiles);
        if results.iter().all(|r| r.ok) {
            Ok(results)
        } else {
            let failing: Vec<&str> = results.iter().filter(|r| !r.ok).map(|r| r.message.as_str()).collect();
            Err(ExecutorError::HealthFailed(failing.join("; ")))
        }
    });
    if let Err(err) = health_results {
        return roll_back_and_fail(workspace_root, artifacts, execution_id, &artifact_path, &applied, &err);
    }

    let recorded = recorder.run("record", || {
        artifacts
            .write_piece(execution_id, "execution", &serde_json::json!({
                "execution_id": execution_id,
                "status": "completed",
            }))
            .map_err(ExecutorError::from)
    });
    if let Err(err) = recorded {
        return roll_back_and_fail(workspace_root, artifacts, execution_id, &artifact_path, &applied, &err);
    }

    ExecutionResult::completed(execution_id, artifact_path)
}

fn validate(
    workspace_root: &Path,
    policy: &lc_policy::PolicyConfig,
    changeset: &ChangeSet,
    decision: &GovernanceDecision,
    approved: bool,
) -> Result<(), ExecutorError> {
    if !approved {
        return Err(ExecutorError::NotApproved {
            decision_id: decision.decision_id,
        });
    }
    if !changeset.verify_checksum() {
        return Err(ExecutorError::Tampered {
            changeset_id: changeset.changeset_id,
        });
    }
    for change in &changeset.file_changes {
        let path = change.path();
        if !path_allowed(path.as_str(), &policy.allowed_paths) {
            return Err(ExecutorError::PathViolation(format!(
                "`{path}` is not under an allowed path"
            )));
        }
        path.resolve_checked(workspace_root)
            .map_err(|e| ExecutorError::PathViolation(e.to_string()))?;
    }
    Ok(())
}

fn path_allowed(path: &str, allowed_paths: &[String]) -> bool {
    allowed_paths.iter().any(|pattern| {
        glob::Pattern::new(pattern).map(|g| g.matches(path)).unwrap_or(false)
    })
}

fn fail_no_rollback(execution_id: &str, artifact_path: &str, step: &str, err: &ExecutorError) -> ExecutionResult {
    ExecutionResult::failed(execution_id, artifact_path, err.code(), step, err.to_string(), false)
}

fn roll_back_and_fail(
    workspace_root: &Path,
    artifacts: &ArtifactStore,
    execution_id: &str,
    artifact_path: &str,
    applied: &[Applied],
    err: &ExecutorError,
) -> ExecutionResult {
    let step = match err {
        ExecutorError::ApplyFailed { .. } | ExecutorError::StaleUpdate { .. } => "apply",
        ExecutorError::VerifyFailed(_) => "verify",
        ExecutorError::HealthFailed(_) => "health",
        ExecutorError::Timeout { .. } => "timeout",
        _ => "pipeline",
    };
    match rollback::rollback(workspace_root, artifacts, execution_id, applied) {
        Ok(()) => ExecutionResult::failed(execution_id, artifact_path, err.code(), step, err.to_string(), true),
        Err(rollback_err) => ExecutionResult::failed(
            execution_id,
            artifact_path,
            rollback_err.code(),
            step,
            format!("{err}; rollback also failed: {rollback_err}"),
            false,
        ),
    }
}
