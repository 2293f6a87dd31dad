// idempotency.rs — computes the deterministic execution_id and decides
// whether a submission should replay a cached result, wait, or proceed.
//
// Grounded on `BLEEP-V1::DeterministicExecutor`'s `executed: BTreeMap`
// skip-if-already-executed check, adapted from in-memory state to the
// execution store as the backing table.

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use lc_core::hasher::hash_str;
use lc_store::{ExecutionRecord, ExecutionStore};

use crate::error::ExecutorError;
use crate::result::ExecutionResult;

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// `execution_id = hash(plan_id || changeset_checksum)` — the same plan and
/// change set always yield the same key, so resubmitting a change is safe.
pub fn execution_id(plan_id: Uuid, changeset_checksum: &str) -> String {
    hash_str(&format!("{plan_id}|{changeset_checksum}"))
}

pub enum IdempotencyOutcome {
    /// No prior attempt, or the prior attempt's TTL expired: proceed.
    Proceed,
    /// A terminal result exists within TTL: return it without re-applying.
    Cached(ExecutionResult),
    /// A prior attempt is still in flight: the caller should wait on the lock.
    InFlight,
}

/// Consult the store for an existing record at `execution_id` and decide
/// how the caller should proceed.
pub fn check(store: &ExecutionStore, execution_id: &str, ttl: Duration) -> Result<IdempotencyOutcome, ExecutorError> {
    let Some(record) = store.get(execution_id)? else {
        return Ok(IdempotencyOutcome::Proceed);
    };

    if !record.status.is_terminal() {
        return Ok(IdempotencyOutcome::InFlight);
    }

    let age = Utc::now().signed_duration_since(record.started_at);
    let age = age.to_std().unwrap_or(Duration::ZERO);
    if age <= ttl {
        return Ok(IdempotencyOutcome::Cached(to_result(&record)));
    }

    Ok(IdempotencyOutcome::Proceed)
}

fn to_result(record: &ExecutionRecord) -> ExecutionResult {
    ExecutionResult {
        execution_id: record.execution_id.clone(),
        status: record.status,
        verification_passed: record.verification_passed,
        health_passed: record.health_passed,
        error_code: None,
        error_step: record.error_step.clone(),
        error_message: record.error_message.clone(),
        rolled_back: record.rolled_back,
        artifact_path: record.artifact_path.clone(),
    }
}
