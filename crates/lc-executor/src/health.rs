// health.rs — the five typed health checks a ChangePlan can declare. Each
// checker normalizes its outcome to `HealthCheckResult` so reflection
// analysis can aggregate across check kinds without string matching.
//
// Grounded on `agenticlaw_operator::tester::TestRunner`'s reqwest-client
// health probe, adapted from an async test harness to a single blocking
// fail-fast call since a health check here gates a live apply, not a test
// suite.

use std::time::{Duration, Instant};

use lc_changeset::health::{HealthCheckResult, HealthErrorCode, HealthCheckSpec};
use lc_policy::CommandProfile;
use rusqlite::Connection;

use crate::verifier::CommandOutcome;

fn ok(latency: Duration, message: impl Into<String>) -> HealthCheckResult {
    HealthCheckResult {
        ok: true,
        latency_ms: latency.as_millis() as u64,
        error_code: None,
        message: message.into(),
    }
}

fn fail(latency: Duration, code: HealthErrorCode, message: impl Into<String>) -> HealthCheckResult {
    HealthCheckResult {
        ok: false,
        latency_ms: latency.as_millis() as u64,
        error_code: Some(code),
        message: message.into(),
    }
}

/// Single-attempt HTTP GET — no retry. A flaky health endpoint should be
/// fixed, not papered over by retrying inside the pipeline.
fn check_http_get(url: &str, expect_status: u16, timeout: Duration) -> HealthCheckResult {
    let start = Instant::now();
    let client = match reqwest::blocking::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(err) => return fail(start.elapsed(), HealthErrorCode::ConnectRefused, err.to_string()),
    };
    match client.get(url).send() {
        Ok(response) => {
            let status = response.status().as_u16();
            if status == expect_status {
                ok(start.elapsed(), format!("{url} returned {status}"))
            } else {
                fail(
                    start.elapsed(),
                    HealthErrorCode::HttpNon200,
                    format!("{url} returned {status}, expected {expect_status}"),
                )
            }
        }
        Err(err) if err.is_timeout() => {
            fail(start.elapsed(), HealthErrorCode::Timeout, format!("{url} timed out: {err}"))
        }
        Err(err) => fail(start.elapsed(), HealthErrorCode::ConnectRefused, err.to_string()),
    }
}

#[cfg(unix)]
fn process_is_alive(process_name: &str) -> bool {
    std::process::Command::new("pgrep")
        .arg(process_name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn process_is_alive(_process_name: &str) -> bool {
    false
}

fn check_process_alive(process_name: &str) -> HealthCheckResult {
    let start = Instant::now();
    if process_is_alive(process_name) {
        ok(start.elapsed(), format!("process `{process_name}` is running"))
    } else {
        fail(
            start.elapsed(),
            HealthErrorCode::ProcessMissing,
            format!("process `{process_name}` not found"),
        )
    }
}

fn check_command_profile(
    profile_name: &str,
    command_profiles: &std::collections::HashMap<String, CommandProfile>,
) -> HealthCheckResult {
    let start = Instant::now();
    let Some(profile) = command_profiles.get(profile_name) else {
        return fail(
            start.elapsed(),
            HealthErrorCode::CommandNonzero,
            format!("no command profile registered for `{profile_name}`"),
        );
    };
    match crate::verifier::run_profile(profile_name, profile) {
        Ok(CommandOutcome { timed_out: true, .. }) => fail(
            start.elapsed(),
            HealthErrorCode::Timeout,
            format!("`{profile_name}` timed out"),
        ),
        Ok(outcome) if outcome.succeeded() => ok(start.elapsed(), format!("`{profile_name}` exited 0")),
        Ok(outcome) => fail(
            start.elapsed(),
            HealthErrorCode::CommandNonzero,
            format!("`{profile_name}` exited {:?}", outcome.exit_code),
        ),
        Err(err) => fail(start.elapsed(), HealthErrorCode::CommandNonzero, err.to_string()),
    }
}

/// Only `sqlite` is implemented: a `Connection::open` plus the plan's
/// `test_query` executed as a single statement. Any other `db_type`
/// reports `db_unreachable` since no driver is wired up for it.
fn check_database(db_type: &str, dsn: &str, test_query: &str) -> HealthCheckResult {
    let start = Instant::now();
    if db_type != "sqlite" {
        return fail(
            start.elapsed(),
            HealthErrorCode::DbUnreachable,
            format!("no driver registered for db_type `{db_type}`"),
        );
    }
    match Connection::open(dsn) {
        Ok(conn) => match conn.execute_batch(test_query) {
            Ok(()) => ok(start.elapsed(), "test_query executed"),
            Err(err) => fail(start.elapsed(), HealthErrorCode::DbUnreachable, err.to_string()),
        },
        Err(err) => fail(start.elapsed(), HealthErrorCode::DbUnreachable, err.to_string()),
    }
}

fn check_file_exists(workspace_root: &std::path::Path, paths: &[String]) -> HealthCheckResult {
    let start = Instant::now();
    let missing: Vec<&str> = paths
        .iter()
        .map(|p| p.as_str())
        .filter(|p| !workspace_root.join(p).exists())
        .collect();
    if missing.is_empty() {
        ok(start.elapsed(), format!("{} path(s) present", paths.len()))
    } else {
        fail(
            start.elapsed(),
            HealthErrorCode::FileMissing,
            format!("missing: {}", missing.join(", ")),
        )
    }
}

/// Run one health check spec against the live workspace.
pub fn check_one(
    spec: &HealthCheckSpec,
    workspace_root: &std::path::Path,
    command_profiles: &std::collections::HashMap<String, CommandProfile>,
) -> HealthCheckResult {
    match spec {
        HealthCheckSpec::HttpGet { url, expect_status, timeout } => {
            check_http_get(url, *expect_status, *timeout)
        }
        HealthCheckSpec::ProcessAlive { process_name } => check_process_alive(process_name),
        HealthCheckSpec::CommandProfile { profile_name } => {
            check_command_profile(profile_name, command_profiles)
        }
        HealthCheckSpec::Database { db_type, dsn, test_query } => check_database(db_type, dsn, test_query),
        HealthCheckSpec::FileExists { paths } => check_file_exists(workspace_root, paths),
    }
}

/// Run every health check. Unlike `verifier::verify`, a failing check does
/// not short-circuit the rest — callers want the full health picture to
/// decide what broke, not just the first symptom.
pub fn check_all(
    specs: &[HealthCheckSpec],
    workspace_root: &std::path::Path,
    command_profiles: &std::collections::HashMap<String, CommandProfile>,
) -> Vec<HealthCheckResult> {
    specs
        .iter()
        .map(|spec| check_one(spec, workspace_root, command_profiles))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn file_exists_passes_when_all_present() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();
        let result = check_file_exists(dir.path(), &["a.txt".to_string()]);
        assert!(result.ok);
    }

    #[test]
    fn file_exists_fails_with_missing_listed() {
        let dir = tempfile::tempdir().unwrap();
        let result = check_file_exists(dir.path(), &["missing.txt".to_string()]);
        assert!(!result.ok);
        assert_eq!(result.error_code, Some(HealthErrorCode::FileMissing));
        assert!(result.message.contains("missing.txt"));
    }

    #[test]
    fn database_unsupported_driver_reports_unreachable() {
        let result = check_database("postgres", "postgres://localhost/db", "SELECT 1");
        assert!(!result.ok);
        assert_eq!(result.error_code, Some(HealthErrorCode::DbUnreachable));
    }

    #[test]
    fn database_sqlite_runs_test_query() {
        let dir = tempfile::tempdir().unwrap();
        let dsn = dir.path().join("health.db");
        let result = check_database("sqlite", dsn.to_str().unwrap(), "CREATE TABLE t (id INTEGER)");
        assert!(result.ok);
    }

    #[test]
    fn command_profile_missing_name_fails() {
        let profiles = std::collections::HashMap::new();
        let result = check_command_profile("absent", &profiles);
        assert!(!result.ok);
    }

    #[test]
    fn check_all_does_not_short_circuit() {
        let dir = tempfile::tempdir().unwrap();
        let specs = vec![
            HealthCheckSpec::FileExists { paths: vec!["missing.txt".into()] },
            HealthCheckSpec::FileExists { paths: vec![] },
        ];
        let results = check_all(&specs, dir.path(), &std::collections::HashMap::new());
        assert_eq!(results.len(), 2);
        assert!(!results[0].ok);
        assert!(results[1].ok);
    }
}
