// submit.rs — `lc submit`: load a plan and changeset from disk, run them
// through WriteGate, and (if permitted) submit to the Executor.

use std::path::Path;

use clap::ValueEnum;

use lc_changeset::{ChangePlan, ChangeSet};
use lc_executor::{Gcec, SubmitOptions};
use lc_store::TriggerKind;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TriggerArg {
    Manual,
    Agent,
    Retry,
    Repair,
    Scheduled,
}

impl From<TriggerArg> for TriggerKind {
    fn from(value: TriggerArg) -> Self {
        match value {
            TriggerArg::Manual => TriggerKind::Manual,
            TriggerArg::Agent => TriggerKind::Agent,
            TriggerArg::Retry => TriggerKind::Retry,
            TriggerArg::Repair => TriggerKind::Repair,
            TriggerArg::Scheduled => TriggerKind::Scheduled,
        }
    }
}

pub fn execute(gcec: &Gcec, plan_path: &Path, changeset_path: &Path, trigger: TriggerArg) -> anyhow::Result<()> {
    let plan: ChangePlan = serde_json::from_str(&std::fs::read_to_string(plan_path)?)?;
    let changeset: ChangeSet = serde_json::from_str(&std::fs::read_to_string(changeset_path)?)?;

    let decision = lc_policy::evaluate(&plan, &changeset, gcec.policy(), None);
    println!(
        "WriteGate verdict: {:?} (risk: {:?})",
        decision.verdict, decision.risk_level_effective
    );
    for reason in &decision.reasons {
        println!("  - {reason}");
    }

    // A retry/repair submitted standalone via the CLI has no known parent to
    // thread through `--parent`/`--correlation-id` flags; those lineage
    // fields are left unset, so `submit` defaults correlation_id to this
    // execution's own id, same as a root run.
    let options = SubmitOptions {
        trigger_kind: trigger.into(),
        ..Default::default()
    };

    let result = gcec.submit(&plan, &changeset, &decision, options)?;
    println!("execution_id: {}", result.execution_id);
    println!("status: {:?}", result.status);
    if let Some(step) = &result.error_step {
        println!("error_step: {step}");
    }
    if let Some(message) = &result.error_message {
        println!("error_message: {message}");
    }
    println!("artifact_path: {}", result.artifact_path);

    if !matches!(result.status, lc_store::ExecutionStatus::Completed) {
        anyhow::bail!("execution {} did not complete", result.execution_id);
    }
    Ok(())
}
