// hints.rs — offline reflection analysis: scan the execution store over a
// time window and emit a `ReflectionHints` document.
//
// Grounded loosely on `ta_audit::drift`'s load-analyze-emit-typed-findings
// shape (BaselineStore/DriftReport/DriftFinding) for the reporting structure;
// persisted the same way, as a single JSON document under a dotfile path.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use lc_store::{ExecutionStatus, ExecutionStore, ListFilters};

use crate::error::ReflectionError;
use crate::similarity::is_false_allow;

/// A single error step's aggregated frequency over the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorStepFrequency {
    pub step_name: String,
    pub count: u64,
    pub example_execution_ids: Vec<String>,
}

/// A verdict=ALLOW decision whose outcome was a failure or rollback —
/// evidence that a policy snapshot was too permissive for this shape of
/// change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FalseAllowPattern {
    pub affected_paths: Vec<String>,
    pub error_message: Option<String>,
    pub execution_id: String,
}

/// A step that is slow relative to its peers, named for the suggested
/// policy/timeout review it implies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowStep {
    pub step_name: String,
    pub mean_duration_seconds: f64,
    pub sample_size: u64,
}

/// The time window a `ReflectionHints` document summarizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Window {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

/// Advisory offline analysis output. WriteGate may append these to a
/// decision's `reasons` (with `reflection_hints_used=true` and a digest)
/// but must never let them change a verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionHints {
    pub window: Window,
    pub top_error_steps: Vec<ErrorStepFrequency>,
    pub false_allow_patterns: Vec<FalseAllowPattern>,
    pub slow_steps: Vec<SlowStep>,
    pub suggested_policy_notes: Vec<String>,
    pub evidence_execution_ids: Vec<String>,
}

impl ReflectionHints {
    /// A stable digest callers can record alongside `reflection_hints_used`
    /// without re-serializing the whole document for comparison.
    pub fn digest(&self) -> Result<String, ReflectionError> {
        let json = serde_json::to_vec(self)?;
        Ok(lc_core::hasher::hash_bytes(&json))
    }
}

/// Build a `ReflectionHints` document by scanning every execution in the
/// store started within `window_days` days of now.
pub fn build_hints(store: &ExecutionStore, window_days: i64) -> Result<ReflectionHints, ReflectionError> {
    let until = Utc::now();
    let since = until - Duration::days(window_days);

    let mut filters = ListFilters::new();
    filters.since = Some(since);
    filters.limit = i64::MAX;

    let records = store.list(&filters)?;

    let mut error_step_counts: BTreeMap<String, (u64, Vec<String>)> = BTreeMap::new();
    let mut false_allows = Vec::new();
    let mut evidence_ids = Vec::new();

    for record in &records {
        evidence_ids.push(record.execution_id.clone());

        if matches!(record.status, ExecutionStatus::Failed | ExecutionStatus::RolledBack) {
            if let Some(step) = &record.error_step {
                let entry = error_step_counts.entry(step.clone()).or_insert((0, Vec::new()));
                entry.0 += 1;
                if entry.1.len() < 5 {
                    entry.1.push(record.execution_id.clone());
                }
            }
        }

        if is_false_allow(record) {
            false_allows.push(FalseAllowPattern {
                affected_paths: record.affected_paths.clone(),
                error_message: record.error_message.clone(),
                execution_id: record.execution_id.clone(),
            });
        }
    }

    let mut top_error_steps: Vec<ErrorStepFrequency> = error_step_counts
        .into_iter()
        .map(|(step_name, (count, example_execution_ids))| ErrorStepFrequency {
            step_name,
            count,
            example_execution_ids,
        })
        .collect();
    top_error_steps.sort_by(|a, b| b.count.cmp(&a.count));
    top_error_steps.truncate(10);

    let slow_steps = slow_steps_for(store, &records)?;

    let mut suggested_policy_notes = Vec::new();
    for pattern in &false_allows {
        if let Some(path) = pattern.affected_paths.first() {
            suggested_policy_notes.push(format!(
                "consider adding `{path}` (or its parent) to always_review_paths: execution {} was allowed and then failed",
                pattern.execution_id
            ));
        }
    }
    for step in &top_error_steps {
        if step.count >= 3 {
            suggested_policy_notes.push(format!(
                "step `{}` failed {} times in the window; review its verification/health spec",
                step.step_name, step.count
            ));
        }
    }

    Ok(ReflectionHints {
        window: Window { since, until },
        top_error_steps,
        false_allow_patterns: false_allows,
        slow_steps,
        suggested_policy_notes,
        evidence_execution_ids: evidence_ids,
    })
}

fn slow_steps_for(
    store: &ExecutionStore,
    records: &[lc_store::ExecutionRecord],
) -> Result<Vec<SlowStep>, ReflectionError> {
    let mut durations: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in records {
        for step in store.list_steps(&record.execution_id)? {
            if let (Some(ended_at), started_at) = (step.ended_at, step.started_at) {
                let seconds = (ended_at - started_at).num_milliseconds() as f64 / 1000.0;
                durations.entry(step.step_name.clone()).or_default().push(seconds);
            }
        }
    }

    let mut slow: Vec<SlowStep> = durations
        .into_iter()
        .map(|(step_name, samples)| {
            let sample_size = samples.len() as u64;
            let mean_duration_seconds = samples.iter().sum::<f64>() / samples.len() as f64;
            SlowStep {
                step_name,
                mean_duration_seconds,
                sample_size,
            }
        })
        .collect();
    slow.sort_by(|a, b| b.mean_duration_seconds.partial_cmp(&a.mean_duration_seconds).unwrap());
    slow.truncate(10);
    Ok(slow)
}
