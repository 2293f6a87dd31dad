// events.rs — events.jsonl: one step-start/step-end JSON object per line,
// hash-chained the way `ta-audit::log::AuditLog` chains `AuditEvent`s, so
// tampering with a past event is detectable by re-walking the chain.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ArtifactError;
use lc_core::hasher::hash_str;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPhase {
    StepStart,
    StepEnd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub phase: EventPhase,
    pub step_name: String,
    pub status: Option<String>,
    pub duration_seconds: Option<f64>,
    pub error_code: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
}

impl StepEvent {
    pub fn start(step_name: impl Into<String>) -> Self {
        Self {
            phase: EventPhase::StepStart,
            step_name: step_name.into(),
            status: None,
            duration_seconds: None,
            error_code: None,
            timestamp: Utc::now(),
            previous_hash: None,
        }
    }

    pub fn end(
        step_name: impl Into<String>,
        status: impl Into<String>,
        duration_seconds: f64,
        error_code: Option<String>,
    ) -> Self {
        Self {
            phase: EventPhase::StepEnd,
            step_name: step_name.into(),
            status: Some(status.into()),
            duration_seconds: Some(duration_seconds),
            error_code,
            timestamp: Utc::now(),
            previous_hash: None,
        }
    }
}

/// Append one event to `events.jsonl`, linking it to the hash of the
/// previously written line.
pub fn append_event(path: &Path, mut event: StepEvent) -> Result<(), ArtifactError> {
    let previous_hash = last_hash(path)?;
    event.previous_hash = previous_hash;

    let json = serde_json::to_string(&event)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    writeln!(file, "{json}").map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

pub fn read_all(path: &Path) -> Result<Vec<StepEvent>, ArtifactError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        events.push(serde_json::from_str(&line)?);
    }
    Ok(events)
}

/// Return the last `N` events, oldest-first within that tail window.
pub fn tail(path: &Path, n: usize) -> Result<Vec<StepEvent>, ArtifactError> {
    let all = read_all(path)?;
    let start = all.len().saturating_sub(n);
    Ok(all[start..].to_vec())
}

/// Verify the hash chain. Mirrors `AuditLog::verify_chain`: hashes the raw
/// line rather than the re-serialized event, since field order is not
/// guaranteed stable across serde versions.
pub fn verify_chain(path: &Path) -> Result<bool, ArtifactError> {
    if !path.exists() {
        return Ok(true);
    }
    let file = std::fs::File::open(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let mut previous: Option<String> = None;
    for line in reader.lines() {
        let line = line.map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let event: StepEvent = serde_json::from_str(&line)?;
        if event.previous_hash != previous {
            return Ok(false);
        }
        previous = Some(hash_str(&line));
    }
    Ok(true)
}

fn last_hash(path: &Path) -> Result<Option<String>, ArtifactError> {
    if !path.exists() {
        return Ok(None);
    }
    let file = std::fs::File::open(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let mut last_line = None;
    for line in reader.lines() {
        let line = line.map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if !line.trim().is_empty() {
            last_line = Some(line);
        }
    }
    Ok(last_line.map(|l| hash_str(&l)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appended_events_chain_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        append_event(&path, StepEvent::start("apply")).unwrap();
        append_event(&path, StepEvent::end("apply", "ok", 0.5, None)).unwrap();
        assert!(verify_chain(&path).unwrap());
        let events = read_all(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[1].previous_hash.is_some());
    }

    #[test]
    fn tampering_breaks_chain_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        append_event(&path, StepEvent::start("apply")).unwrap();
        append_event(&path, StepEvent::end("apply", "ok", 0.1, None)).unwrap();

        let mut lines: Vec<String> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect();
        lines.remove(0);
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();

        assert!(!verify_chain(&path).unwrap());
    }

    #[test]
    fn tail_returns_most_recent_n() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        for i in 0..5 {
            append_event(&path, StepEvent::start(format!("step-{i}"))).unwrap();
        }
        let last_two = tail(&path, 2).unwrap();
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[1].step_name, "step-4");
    }
}
