// similarity.rs — TF/cosine over error text, Jaccard over affected paths,
// combined into a single similarity score for `find_similar_executions`.
//
// No ML dependency: tokenization is lowercase-and-split-on-non-alphanumeric,
// term frequency vectors are plain HashMaps, cosine is the dot product over
// their union divided by the product of their norms.

use std::collections::{HashMap, HashSet};

use lc_store::{ExecutionRecord, ExecutionStatus};
use lc_policy::Verdict;

const ERROR_WEIGHT: f64 = 0.5;
const PATH_WEIGHT: f64 = 0.3;
const METADATA_WEIGHT: f64 = 0.2;

/// A candidate execution scored against a query execution.
#[derive(Debug, Clone)]
pub struct ScoredExecution {
    pub execution_id: String,
    pub score: f64,
}

fn tokenize(text: &str) -> HashMap<String, f64> {
    let mut counts: HashMap<String, f64> = HashMap::new();
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        *counts.entry(token.to_string()).or_insert(0.0) += 1.0;
    }
    counts
}

fn cosine_similarity(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0;
    for (term, a_count) in a {
        if let Some(b_count) = b.get(term) {
            dot += a_count * b_count;
        }
    }
    let norm_a: f64 = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn jaccard_similarity(a: &[String], b: &[String]) -> f64 {
    let set_a: HashSet<&String> = a.iter().collect();
    let set_b: HashSet<&String> = b.iter().collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn error_text(record: &ExecutionRecord) -> String {
    let mut parts = Vec::new();
    if let Some(step) = &record.error_step {
        parts.push(step.clone());
    }
    if let Some(message) = &record.error_message {
        parts.push(message.clone());
    }
    parts.join(" ")
}

fn metadata_similarity(a: &ExecutionRecord, b: &ExecutionRecord) -> f64 {
    let status_match = if a.status == b.status { 0.5 } else { 0.0 };
    let verdict_match = if verdict_eq(a.verdict, b.verdict) { 0.5 } else { 0.0 };
    status_match + verdict_match
}

fn verdict_eq(a: Verdict, b: Verdict) -> bool {
    std::mem::discriminant(&a) == std::mem::discriminant(&b)
}

/// Cosine similarity over error text alone (step name + message tokens).
/// Ignores affected paths and status/verdict metadata entirely.
pub fn error_only_score(query: &ExecutionRecord, candidate: &ExecutionRecord) -> f64 {
    cosine_similarity(&tokenize(&error_text(query)), &tokenize(&error_text(candidate)))
}

/// Jaccard similarity over affected paths alone. Ignores error text and
/// status/verdict metadata entirely.
pub fn path_only_score(query: &ExecutionRecord, candidate: &ExecutionRecord) -> f64 {
    jaccard_similarity(&query.affected_paths, &candidate.affected_paths)
}

/// Combined similarity score: 0.5 error + 0.3 path + 0.2 metadata.
pub fn score(query: &ExecutionRecord, candidate: &ExecutionRecord) -> f64 {
    let metadata_score = metadata_similarity(query, candidate);
    ERROR_WEIGHT * error_only_score(query, candidate)
        + PATH_WEIGHT * path_only_score(query, candidate)
        + METADATA_WEIGHT * metadata_score
}

/// Rank `candidates` against `query` by `scorer`, dropping the query
/// itself, anything below `min_similarity`, and (if
/// `exclude_same_correlation`) executions sharing the query's correlation
/// id — so retries of the same task don't swamp true cross-task
/// similarities.
fn rank_by(
    query: &ExecutionRecord,
    candidates: &[ExecutionRecord],
    limit: usize,
    min_similarity: f64,
    exclude_same_correlation: bool,
    scorer: impl Fn(&ExecutionRecord, &ExecutionRecord) -> f64,
) -> Vec<ScoredExecution> {
    let mut scored: Vec<ScoredExecution> = candidates
        .iter()
        .filter(|c| c.execution_id != query.execution_id)
        .filter(|c| !(exclude_same_correlation && c.correlation_id == query.correlation_id))
        .map(|c| ScoredExecution {
            execution_id: c.execution_id.clone(),
            score: scorer(query, c),
        })
        .filter(|s| s.score >= min_similarity)
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

/// Rank by the combined error+path+metadata score (§4.9's default query).
pub fn rank(
    query: &ExecutionRecord,
    candidates: &[ExecutionRecord],
    limit: usize,
    min_similarity: f64,
    exclude_same_correlation: bool,
) -> Vec<ScoredExecution> {
    rank_by(query, candidates, limit, min_similarity, exclude_same_correlation, score)
}

/// Rank by error text alone — useful when the caller only cares "has this
/// failure mode happened before" regardless of which files were touched.
pub fn rank_by_error(
    query: &ExecutionRecord,
    candidates: &[ExecutionRecord],
    limit: usize,
    min_similarity: f64,
    exclude_same_correlation: bool,
) -> Vec<ScoredExecution> {
    rank_by(
        query,
        candidates,
        limit,
        min_similarity,
        exclude_same_correlation,
        error_only_score,
    )
}

/// Rank by affected paths alone — useful when the caller only cares "has
/// this area of the workspace been touched before" regardless of outcome.
pub fn rank_by_paths(
    query: &ExecutionRecord,
    candidates: &[ExecutionRecord],
    limit: usize,
    min_similarity: f64,
    exclude_same_correlation: bool,
) -> Vec<ScoredExecution> {
    rank_by(
        query,
        candidates,
        limit,
        min_similarity,
        exclude_same_correlation,
        path_only_score,
    )
}

/// A "false allow": the decision said ALLOW but the outcome was bad. These
/// feed `ReflectionHints::false_allow_patterns`.
pub fn is_false_allow(record: &ExecutionRecord) -> bool {
    matches!(record.verdict, Verdict::Allow)
        && matches!(record.status, ExecutionStatus::Failed | ExecutionStatus::RolledBack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lc_changeset::RiskLevel;
    use lc_store::TriggerKind;
    use uuid::Uuid;

    fn record(id: &str, paths: &[&str], error: Option<&str>, verdict: Verdict, status: ExecutionStatus) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: id.to_string(),
            plan_id: Uuid::new_v4(),
            changeset_id: Uuid::new_v4(),
            decision_id: Uuid::new_v4(),
            checksum: "x".into(),
            verdict,
            risk_level: RiskLevel::Medium,
            status,
            started_at: Utc::now(),
            completed_at: None,
            affected_paths: paths.iter().map(|p| p.to_string()).collect(),
            artifact_path: format!(".lonelycat/executions/{id}"),
            verification_passed: None,
            health_passed: None,
            error_step: Some("verify".into()),
            error_message: error.map(String::from),
            rolled_back: false,
            correlation_id: id.to_string(),
            parent_execution_id: None,
            trigger_kind: TriggerKind::Agent,
            is_repair: false,
            repair_for_execution_id: None,
        }
    }

    #[test]
    fn identical_error_text_and_paths_scores_near_one() {
        let a = record("a", &["src/app.py"], Some("connection refused"), Verdict::Allow, ExecutionStatus::Failed);
        let b = record("b", &["src/app.py"], Some("connection refused"), Verdict::Allow, ExecutionStatus::Failed);
        let s = score(&a, &b);
        assert!(s > 0.9, "expected near-identical score, got {s}");
    }

    #[test]
    fn disjoint_error_text_and_paths_scores_low() {
        let a = record("a", &["src/app.py"], Some("connection refused"), Verdict::Allow, ExecutionStatus::Failed);
        let b = record("b", &["docs/readme.md"], Some("permission denied"), Verdict::Deny, ExecutionStatus::Completed);
        let s = score(&a, &b);
        assert!(s < 0.2, "expected low score, got {s}");
    }

    #[test]
    fn rank_excludes_same_correlation_by_default() {
        let query = record("a", &["src/app.py"], Some("timeout"), Verdict::Allow, ExecutionStatus::Failed);
        let mut same_corr = record("b", &["src/app.py"], Some("timeout"), Verdict::Allow, ExecutionStatus::Failed);
        same_corr.correlation_id = query.correlation_id.clone();
        let other = record("c", &["src/app.py"], Some("timeout"), Verdict::Allow, ExecutionStatus::Failed);

        let ranked = rank(&query, &[same_corr, other], 10, 0.0, true);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].execution_id, "c");
    }

    #[test]
    fn rank_by_error_ignores_disjoint_paths() {
        let query = record("a", &["src/app.py"], Some("connection refused"), Verdict::Allow, ExecutionStatus::Failed);
        let same_error = record("b", &["docs/readme.md"], Some("connection refused"), Verdict::Deny, ExecutionStatus::Completed);
        let different_error = record("c", &["src/app.py"], Some("permission denied"), Verdict::Allow, ExecutionStatus::Failed);

        let ranked = rank_by_error(&query, &[same_error, different_error], 10, 0.5, false);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].execution_id, "b");
    }

    #[test]
    fn rank_by_paths_ignores_disjoint_error_text() {
        let query = record("a", &["src/app.py"], Some("connection refused"), Verdict::Allow, ExecutionStatus::Failed);
        let same_path = record("b", &["src/app.py"], Some("permission denied"), Verdict::Deny, ExecutionStatus::Completed);
        let different_path = record("c", &["docs/readme.md"], Some("connection refused"), Verdict::Allow, ExecutionStatus::Failed);

        let ranked = rank_by_paths(&query, &[same_path, different_path], 10, 0.5, false);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].execution_id, "b");
    }

    #[test]
    fn false_allow_detects_allow_verdict_with_bad_outcome() {
        let failed_allow = record("a", &[], None, Verdict::Allow, ExecutionStatus::RolledBack);
        let clean_allow = record("b", &[], None, Verdict::Allow, ExecutionStatus::Completed);
        assert!(is_false_allow(&failed_allow));
        assert!(!is_false_allow(&clean_allow));
    }
}
