// store.rs — ExecutionStore: the rusqlite-backed system of record for
// executions, their steps, and approvals.
//
// Grounded on `ta-db-proxy-sqlite`'s dependency declaration (confirming
// `rusqlite` is a real, already-adopted stack choice) and on
// `mandubian-ccos`'s `SqliteArchive` (Arc<Mutex<Connection>>, prepare/query_row,
// `OptionalExtension`) for the connection-wrapping idiom.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use lc_changeset::RiskLevel;
use lc_policy::{GovernanceApproval, Verdict};

use crate::error::StoreError;
use crate::migrations;
use crate::models::{ExecutionRecord, ExecutionStatus, ExecutionStep, Lineage, Statistics, TriggerKind};

/// Filters accepted by `list_executions`.
#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    pub status: Option<ExecutionStatus>,
    pub verdict: Option<Verdict>,
    pub risk_level: Option<RiskLevel>,
    pub since: Option<DateTime<Utc>>,
    pub correlation_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl ListFilters {
    pub fn new() -> Self {
        Self {
            limit: 50,
            ..Default::default()
        }
    }
}

pub struct ExecutionStore {
    conn: Arc<Mutex<Connection>>,
}

impl ExecutionStore {
    /// Open (creating if absent) the execution store at `path`, running all
    /// pending migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Open {
                path: path.display().to_string(),
                source: rusqlite::Error::ModuleError(source.to_string()),
            })?;
        }
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory store — used by tests and by `replay_execution`
    /// scratch reconstructions that never touch the on-disk store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: ":memory:".into(),
            source,
        })?;
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Register a new execution as `pending`. Used by the Idempotency
    /// Manager to claim an `execution_id` before the pipeline runs.
    pub fn insert_pending(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO executions (
                execution_id, plan_id, changeset_id, decision_id, checksum, verdict,
                risk_level, status, started_at, completed_at, affected_paths,
                artifact_path, verification_passed, health_passed, error_step,
                error_message, rolled_back, correlation_id, parent_execution_id,
                trigger_kind, is_repair, repair_for_execution_id
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22)",
            params![
                record.execution_id,
                record.plan_id.to_string(),
                record.changeset_id.to_string(),
                record.decision_id.to_string(),
                record.checksum,
                verdict_str(record.verdict),
                risk_str(record.risk_level),
                record.status.as_str(),
                record.started_at.to_rfc3339(),
                record.completed_at.map(|t| t.to_rfc3339()),
                serde_json::to_string(&record.affected_paths)?,
                record.artifact_path,
                record.verification_passed,
                record.health_passed,
                record.error_step,
                record.error_message,
                record.rolled_back,
                record.correlation_id,
                record.parent_execution_id,
                record.trigger_kind.as_str(),
                record.is_repair,
                record.repair_for_execution_id,
            ],
        )?;
        Ok(())
    }

    /// Overwrite an execution's mutable fields (status, timestamps, check
    /// results, error info) after a pipeline stage updates it.
    pub fn update(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE executions SET
                status = ?2, completed_at = ?3, verification_passed = ?4,
                health_passed = ?5, error_step = ?6, error_message = ?7,
                rolled_back = ?8
             WHERE execution_id = ?1",
            params![
                record.execution_id,
                record.status.as_str(),
                record.completed_at.map(|t| t.to_rfc3339()),
                record.verification_passed,
                record.health_passed,
                record.error_step,
                record.error_message,
                record.rolled_back,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                execution_id: record.execution_id.clone(),
            });
        }
        Ok(())
    }

    pub fn get(&self, execution_id: &str) -> Result<Option<ExecutionRecord>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT execution_id, plan_id, changeset_id, decision_id, checksum, verdict,
                        risk_level, status, started_at, completed_at, affected_paths,
                        artifact_path, verification_passed, health_passed, error_step,
                        error_message, rolled_back, correlation_id, parent_execution_id,
                        trigger_kind, is_repair, repair_for_execution_id
                 FROM executions WHERE execution_id = ?1",
                [execution_id],
                row_to_record,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list(&self, filters: &ListFilters) -> Result<Vec<ExecutionRecord>, StoreError> {
        let conn = self.conn()?;
        let mut sql = String::from(
            "SELECT execution_id, plan_id, changeset_id, decision_id, checksum, verdict,
                    risk_level, status, started_at, completed_at, affected_paths,
                    artifact_path, verification_passed, health_passed, error_step,
                    error_message, rolled_back, correlation_id, parent_execution_id,
                    trigger_kind, is_repair, repair_for_execution_id
             FROM executions WHERE 1=1",
        );
        if filters.status.is_some() {
            sql.push_str(" AND status = :status");
        }
        if filters.verdict.is_some() {
            sql.push_str(" AND verdict = :verdict");
        }
        if filters.risk_level.is_some() {
            sql.push_str(" AND risk_level = :risk_level");
        }
        if filters.since.is_some() {
            sql.push_str(" AND started_at >= :since");
        }
        if filters.correlation_id.is_some() {
            sql.push_str(" AND correlation_id = :correlation_id");
        }
        sql.push_str(" ORDER BY started_at DESC LIMIT :limit OFFSET :offset");

        let mut stmt = conn.prepare(&sql)?;
        let status = filters.status.map(|s| s.as_str().to_string());
        let verdict = filters.verdict.map(verdict_str);
        let risk_level = filters.risk_level.map(risk_str);
        let since = filters.since.map(|t| t.to_rfc3339());

        let rows = stmt.query_map(
            rusqlite::named_params! {
                ":status": status,
                ":verdict": verdict,
                ":risk_level": risk_level,
                ":since": since,
                ":correlation_id": filters.correlation_id,
                ":limit": filters.limit,
                ":offset": filters.offset,
            },
            row_to_record,
        )?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn list_steps(&self, execution_id: &str) -> Result<Vec<ExecutionStep>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT execution_id, step_num, step_name, status, started_at, ended_at,
                    error_code, error_message, log_ref
             FROM execution_steps WHERE execution_id = ?1 ORDER BY step_num ASC",
        )?;
        let rows = stmt.query_map([execution_id], row_to_step)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn upsert_step(&self, step: &ExecutionStep) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO execution_steps (
                execution_id, step_num, step_name, status, started_at, ended_at,
                error_code, error_message, log_ref
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)
             ON CONFLICT(execution_id, step_num) DO UPDATE SET
                status = excluded.status,
                ended_at = excluded.ended_at,
                error_code = excluded.error_code,
                error_message = excluded.error_message,
                log_ref = excluded.log_ref",
            params![
                step.execution_id,
                step.step_num,
                step.step_name,
                step.status.as_str(),
                step.started_at.to_rfc3339(),
                step.ended_at.map(|t| t.to_rfc3339()),
                step.error_code,
                step.error_message,
                step.log_ref,
            ],
        )?;
        Ok(())
    }

    pub fn record_approval(&self, approval: &GovernanceApproval) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO approvals (approval_id, decision_id, approved_by, approved_at, note)
             VALUES (?1,?2,?3,?4,?5)",
            params![
                approval.approval_id.to_string(),
                approval.decision_id.to_string(),
                approval.approved_by,
                approval.approved_at.to_rfc3339(),
                approval.note,
            ],
        )?;
        Ok(())
    }

    /// Whether a `NEED_APPROVAL` decision has a recorded approval.
    pub fn has_approval(&self, decision_id: Uuid) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM approvals WHERE decision_id = ?1",
            [decision_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// `get_execution_lineage`: ancestors via the `parent_execution_id`
    /// chain, descendants via BFS, siblings sharing this execution's
    /// parent. Cycle protection via a visited set and `depth_limit`.
    pub fn get_lineage(&self, execution_id: &str, depth_limit: usize) -> Result<Lineage, StoreError> {
        let this = self.get(execution_id)?.ok_or_else(|| StoreError::NotFound {
            execution_id: execution_id.to_string(),
        })?;

        let mut ancestors = Vec::new();
        let mut visited = std::collections::HashSet::new();
        visited.insert(this.execution_id.clone());
        let mut cursor = this.parent_execution_id.clone();
        while let Some(id) = cursor {
            if ancestors.len() >= depth_limit || !visited.insert(id.clone()) {
                break;
            }
            match self.get(&id)? {
                Some(parent) => {
                    cursor = parent.parent_execution_id.clone();
                    ancestors.push(parent);
                }
                None => break,
            }
        }

        let mut descendants = Vec::new();
        let mut visited = std::collections::HashSet::new();
        visited.insert(this.execution_id.clone());
        let mut frontier = vec![this.execution_id.clone()];
        while !frontier.is_empty() && descendants.len() < depth_limit {
            let mut next_frontier = Vec::new();
            for parent_id in frontier {
                for child in self.children_of(&parent_id)? {
                    if visited.insert(child.execution_id.clone()) {
                        next_frontier.push(child.execution_id.clone());
                        descendants.push(child);
                    }
                }
            }
            frontier = next_frontier;
        }

        let siblings = match &this.parent_execution_id {
            Some(parent_id) => self
                .children_of(parent_id)?
                .into_iter()
                .filter(|e| e.execution_id != this.execution_id)
                .collect(),
            None => Vec::new(),
        };

        Ok(Lineage {
            this,
            ancestors,
            descendants,
            siblings,
        })
    }

    fn children_of(&self, parent_execution_id: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT execution_id, plan_id, changeset_id, decision_id, checksum, verdict,
                    risk_level, status, started_at, completed_at, affected_paths,
                    artifact_path, verification_passed, health_passed, error_step,
                    error_message, rolled_back, correlation_id, parent_execution_id,
                    trigger_kind, is_repair, repair_for_execution_id
             FROM executions WHERE parent_execution_id = ?1 ORDER BY started_at ASC",
        )?;
        let rows = stmt.query_map([parent_execution_id], row_to_record)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// `list_executions_by_correlation`: the full tree, ordered by start time.
    pub fn list_by_correlation(&self, correlation_id: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT execution_id, plan_id, changeset_id, decision_id, checksum, verdict,
                    risk_level, status, started_at, completed_at, affected_paths,
                    artifact_path, verification_passed, health_passed, error_step,
                    error_message, rolled_back, correlation_id, parent_execution_id,
                    trigger_kind, is_repair, repair_for_execution_id
             FROM executions WHERE correlation_id = ?1 ORDER BY started_at ASC",
        )?;
        let rows = stmt.query_map([correlation_id], row_to_record)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn get_statistics(&self) -> Result<Statistics, StoreError> {
        let conn = self.conn()?;
        let total_executions: u64 =
            conn.query_row("SELECT COUNT(*) FROM executions", [], |r| r.get(0))?;

        let mut by_status = std::collections::BTreeMap::new();
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM executions GROUP BY status")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?;
        for row in rows {
            let (k, v) = row?;
            by_status.insert(k, v);
        }

        let mut by_verdict = std::collections::BTreeMap::new();
        let mut stmt = conn.prepare("SELECT verdict, COUNT(*) FROM executions GROUP BY verdict")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?;
        for row in rows {
            let (k, v) = row?;
            by_verdict.insert(k, v);
        }

        let mut by_risk_level = std::collections::BTreeMap::new();
        let mut stmt = conn.prepare("SELECT risk_level, COUNT(*) FROM executions GROUP BY risk_level")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?;
        for row in rows {
            let (k, v) = row?;
            by_risk_level.insert(k, v);
        }

        let mean_duration_seconds: Option<f64> = conn
            .query_row(
                "SELECT AVG(
                    (julianday(completed_at) - julianday(started_at)) * 86400.0
                 ) FROM executions WHERE completed_at IS NOT NULL",
                [],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        Ok(Statistics {
            total_executions,
            by_status,
            by_verdict,
            by_risk_level,
            mean_duration_seconds,
        })
    }
}

fn verdict_str(v: Verdict) -> String {
    match v {
        Verdict::Allow => "allow".to_string(),
        Verdict::NeedApproval => "need_approval".to_string(),
        Verdict::Deny => "deny".to_string(),
    }
}

fn parse_verdict(s: &str) -> Verdict {
    match s {
        "allow" => Verdict::Allow,
        "need_approval" => Verdict::NeedApproval,
        _ => Verdict::Deny,
    }
}

fn risk_str(r: RiskLevel) -> String {
    match r {
        RiskLevel::Low => "low".to_string(),
        RiskLevel::Medium => "medium".to_string(),
        RiskLevel::High => "high".to_string(),
        RiskLevel::Critical => "critical".to_string(),
    }
}

fn parse_risk(s: &str) -> RiskLevel {
    match s {
        "low" => RiskLevel::Low,
        "medium" => RiskLevel::Medium,
        "high" => RiskLevel::High,
        _ => RiskLevel::Critical,
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ExecutionRecord> {
    let affected_paths_json: String = row.get(10)?;
    let affected_paths: Vec<String> = serde_json::from_str(&affected_paths_json).unwrap_or_default();
    let started_at: String = row.get(8)?;
    let completed_at: Option<String> = row.get(9)?;

    Ok(ExecutionRecord {
        execution_id: row.get(0)?,
        plan_id: Uuid::parse_str(&row.get::<_, String>(1)?).unwrap_or_default(),
        changeset_id: Uuid::parse_str(&row.get::<_, String>(2)?).unwrap_or_default(),
        decision_id: Uuid::parse_str(&row.get::<_, String>(3)?).unwrap_or_default(),
        checksum: row.get(4)?,
        verdict: parse_verdict(&row.get::<_, String>(5)?),
        risk_level: parse_risk(&row.get::<_, String>(6)?),
        status: ExecutionStatus::parse(&row.get::<_, String>(7)?).unwrap_or(ExecutionStatus::Failed),
        started_at: DateTime::parse_from_rfc3339(&started_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        completed_at: completed_at.and_then(|t| {
            DateTime::parse_from_rfc3339(&t)
                .ok()
                .map(|t| t.with_timezone(&Utc))
        }),
        affected_paths,
        artifact_path: row.get(11)?,
        verification_passed: row.get(12)?,
        health_passed: row.get(13)?,
        error_step: row.get(14)?,
        error_message: row.get(15)?,
        rolled_back: row.get(16)?,
        correlation_id: row.get(17)?,
        parent_execution_id: row.get(18)?,
        trigger_kind: TriggerKind::parse(&row.get::<_, String>(19)?).unwrap_or(TriggerKind::Manual),
        is_repair: row.get(20)?,
        repair_for_execution_id: row.get(21)?,
    })
}

fn row_to_step(row: &rusqlite::Row) -> rusqlite::Result<ExecutionStep> {
    let started_at: String = row.get(4)?;
    let ended_at: Option<String> = row.get(5)?;
    Ok(ExecutionStep {
        execution_id: row.get(0)?,
        step_num: row.get(1)?,
        step_name: row.get(2)?,
        status: ExecutionStatus::parse(&row.get::<_, String>(3)?).unwrap_or(ExecutionStatus::Failed),
        started_at: DateTime::parse_from_rfc3339(&started_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        ended_at: ended_at.and_then(|t| {
            DateTime::parse_from_rfc3339(&t)
                .ok()
                .map(|t| t.with_timezone(&Utc))
        }),
        error_code: row.get(6)?,
        error_message: row.get(7)?,
        log_ref: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(execution_id: &str, correlation_id: &str, parent: Option<&str>) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: execution_id.to_string(),
            plan_id: Uuid::new_v4(),
            changeset_id: Uuid::new_v4(),
            decision_id: Uuid::new_v4(),
            checksum: "abc123".into(),
            verdict: Verdict::Allow,
            risk_level: RiskLevel::Low,
            status: ExecutionStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            affected_paths: vec!["a.txt".into()],
            artifact_path: format!(".lonelycat/executions/{execution_id}"),
            verification_passed: None,
            health_passed: None,
            error_step: None,
            error_message: None,
            rolled_back: false,
            correlation_id: correlation_id.to_string(),
            parent_execution_id: parent.map(String::from),
            trigger_kind: if parent.is_some() {
                TriggerKind::Retry
            } else {
                TriggerKind::Manual
            },
            is_repair: false,
            repair_for_execution_id: None,
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let store = ExecutionStore::open_in_memory().unwrap();
        let record = sample("exec-1", "exec-1", None);
        store.insert_pending(&record).unwrap();
        let fetched = store.get("exec-1").unwrap().unwrap();
        assert_eq!(fetched.execution_id, "exec-1");
        assert_eq!(fetched.status, ExecutionStatus::Pending);
    }

    #[test]
    fn update_changes_status() {
        let store = ExecutionStore::open_in_memory().unwrap();
        let mut record = sample("exec-1", "exec-1", None);
        store.insert_pending(&record).unwrap();
        record.status = ExecutionStatus::Completed;
        record.completed_at = Some(Utc::now());
        store.update(&record).unwrap();
        let fetched = store.get("exec-1").unwrap().unwrap();
        assert_eq!(fetched.status, ExecutionStatus::Completed);
        assert!(fetched.completed_at.is_some());
    }

    #[test]
    fn lineage_walks_parent_chain_and_siblings() {
        let store = ExecutionStore::open_in_memory().unwrap();
        store.insert_pending(&sample("root", "root", None)).unwrap();
        store
            .insert_pending(&sample("retry-1", "root", Some("root")))
            .unwrap();
        store
            .insert_pending(&sample("retry-2", "root", Some("root")))
            .unwrap();

        let lineage = store.get_lineage("retry-1", 20).unwrap();
        assert_eq!(lineage.this.execution_id, "retry-1");
        assert_eq!(lineage.ancestors.len(), 1);
        assert_eq!(lineage.ancestors[0].execution_id, "root");
        assert_eq!(lineage.siblings.len(), 1);
        assert_eq!(lineage.siblings[0].execution_id, "retry-2");

        let root_lineage = store.get_lineage("root", 20).unwrap();
        assert_eq!(root_lineage.descendants.len(), 2);
    }

    #[test]
    fn list_by_correlation_orders_by_started_at() {
        let store = ExecutionStore::open_in_memory().unwrap();
        store.insert_pending(&sample("root", "corr-1", None)).unwrap();
        store
            .insert_pending(&sample("retry-1", "corr-1", Some("root")))
            .unwrap();
        let tree = store.list_by_correlation("corr-1").unwrap();
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn statistics_counts_by_status() {
        let store = ExecutionStore::open_in_memory().unwrap();
        store.insert_pending(&sample("exec-1", "exec-1", None)).unwrap();
        let stats = store.get_statistics().unwrap();
        assert_eq!(stats.total_executions, 1);
        assert_eq!(stats.by_status.get("pending"), Some(&1));
    }

    #[test]
    fn approval_round_trips() {
        let store = ExecutionStore::open_in_memory().unwrap();
        let decision_id = Uuid::new_v4();
        assert!(!store.has_approval(decision_id).unwrap());
        let approval = GovernanceApproval::new(decision_id, "reviewer-1", None);
        store.record_approval(&approval).unwrap();
        assert!(store.has_approval(decision_id).unwrap());
    }

    #[test]
    fn update_missing_execution_errors() {
        let store = ExecutionStore::open_in_memory().unwrap();
        let record = sample("ghost", "ghost", None);
        assert!(matches!(store.update(&record), Err(StoreError::NotFound { .. })));
    }
}
