// migrations.rs — versioned, idempotent schema evolution.
//
// Each migration is a numbered SQL script run inside a transaction. On open,
// the store runs every migration whose version exceeds the persisted
// `schema_migrations.version` high-water mark. Migrations are append-only —
// no column drops — so old records stay queryable after an upgrade.

use rusqlite::Connection;

use crate::error::StoreError;

struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: r#"
            CREATE TABLE IF NOT EXISTS executions (
                execution_id            TEXT PRIMARY KEY,
                plan_id                 TEXT NOT NULL,
                changeset_id            TEXT NOT NULL,
                decision_id             TEXT NOT NULL,
                checksum                TEXT NOT NULL,
                verdict                 TEXT NOT NULL,
                risk_level              TEXT NOT NULL,
                status                  TEXT NOT NULL,
                started_at              TEXT NOT NULL,
                completed_at            TEXT,
                affected_paths          TEXT NOT NULL,
                artifact_path           TEXT NOT NULL,
                verification_passed     INTEGER,
                health_passed           INTEGER,
                error_step              TEXT,
                error_message           TEXT,
                rolled_back             INTEGER NOT NULL DEFAULT 0,
                correlation_id          TEXT NOT NULL,
                parent_execution_id     TEXT,
                trigger_kind            TEXT NOT NULL,
                is_repair               INTEGER NOT NULL DEFAULT 0,
                repair_for_execution_id TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_executions_correlation ON executions(correlation_id);
            CREATE INDEX IF NOT EXISTS idx_executions_parent ON executions(parent_execution_id);
            CREATE INDEX IF NOT EXISTS idx_executions_trigger_kind ON executions(trigger_kind);
            CREATE INDEX IF NOT EXISTS idx_executions_started_at ON executions(started_at);

            CREATE TABLE IF NOT EXISTS execution_steps (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                execution_id  TEXT NOT NULL,
                step_num      INTEGER NOT NULL,
                step_name     TEXT NOT NULL,
                status        TEXT NOT NULL,
                started_at    TEXT NOT NULL,
                ended_at      TEXT,
                error_code    TEXT,
                error_message TEXT,
                log_ref       TEXT,
                UNIQUE(execution_id, step_num)
            );
            CREATE INDEX IF NOT EXISTS idx_steps_execution ON execution_steps(execution_id);
        "#,
    },
    Migration {
        version: 2,
        sql: r#"
            CREATE TABLE IF NOT EXISTS approvals (
                approval_id  TEXT PRIMARY KEY,
                decision_id  TEXT NOT NULL,
                approved_by  TEXT NOT NULL,
                approved_at  TEXT NOT NULL,
                note         TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_approvals_decision ON approvals(decision_id);
        "#,
    },
];

/// Run every migration whose version exceeds the persisted current version.
pub fn run_all(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        conn.execute_batch(migration.sql)
            .map_err(|source| StoreError::Migration {
                version: migration.version,
                source,
            })?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, chrono::Utc::now().to_rfc3339()],
        )?;
        tracing::info!(version = migration.version, "applied schema migration");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_migrations_twice_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();
        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn creates_all_expected_tables() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        for table in ["executions", "execution_steps", "approvals", "schema_migrations"] {
            let exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert!(exists, "expected table `{table}` to exist");
        }
    }
}
