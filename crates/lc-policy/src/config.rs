// config.rs — WriteGate's policy snapshot, loaded once at startup and
// hashed so every decision can be replayed against the exact config that
// produced it.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::PolicyError;
use lc_changeset::RiskLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandProfile {
    pub argv: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_output_cap_bytes")]
    pub output_cap_bytes: usize,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_output_cap_bytes() -> usize {
    1_048_576
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub forbidden_paths: Vec<String>,
    #[serde(default)]
    pub always_review_paths: Vec<String>,
    #[serde(default)]
    pub allowed_paths: Vec<String>,
    #[serde(default = "default_max_files")]
    pub max_files_touched: usize,
    #[serde(default = "default_max_lines")]
    pub max_patch_lines: usize,
    #[serde(default)]
    pub command_profiles: HashMap<String, CommandProfile>,
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,
    #[serde(default = "default_pipeline_timeout")]
    pub pipeline_timeout_secs: u64,
    #[serde(default)]
    pub delete_is_always_high_risk: Vec<String>,
}

fn default_max_files() -> usize {
    50
}

fn default_max_lines() -> usize {
    2000
}

fn default_step_timeout() -> u64 {
    60
}

fn default_pipeline_timeout() -> u64 {
    300
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            forbidden_paths: vec![
                "**/.git/**".into(),
                "**/.env".into(),
                "**/.env.*".into(),
                "**/*.lock".into(),
                "**/secrets/**".into(),
                ".lonelycat/**".into(),
            ],
            always_review_paths: vec![
                "**/schema/**".into(),
                "**/security/**".into(),
                "**/policy/**".into(),
                "**/*.policy.yaml".into(),
            ],
            allowed_paths: vec!["**".into()],
            max_files_touched: default_max_files(),
            max_patch_lines: default_max_lines(),
            command_profiles: HashMap::new(),
            step_timeout_secs: default_step_timeout(),
            pipeline_timeout_secs: default_pipeline_timeout(),
            delete_is_always_high_risk: vec!["**/schema/**".into()],
        }
    }
}

impl PolicyConfig {
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let raw = std::fs::read_to_string(path).map_err(|source| PolicyError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| PolicyError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Canonical hash of this config, recorded on every decision as
    /// `policy_snapshot_hash` so the verdict can be replayed later.
    pub fn snapshot_hash(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn risk_for_delete(&self, path: &str) -> Option<RiskLevel> {
        for pattern in &self.delete_is_always_high_risk {
            if let Ok(glob) = glob::Pattern::new(pattern) {
                if glob.matches(path) {
                    return Some(RiskLevel::High);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_hash_is_deterministic() {
        let config = PolicyConfig::default();
        assert_eq!(config.snapshot_hash(), config.snapshot_hash());
    }

    #[test]
    fn snapshot_hash_changes_with_content() {
        let a = PolicyConfig::default();
        let mut b = PolicyConfig::default();
        b.max_files_touched += 1;
        assert_ne!(a.snapshot_hash(), b.snapshot_hash());
    }

    #[test]
    fn load_missing_file_errors() {
        let result = PolicyConfig::load(Path::new("/nonexistent/policy.yaml"));
        assert!(matches!(result, Err(PolicyError::ConfigRead { .. })));
    }

    #[test]
    fn load_parses_yaml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        std::fs::write(&path, "forbidden_paths:\n  - \"**/.env\"\n").unwrap();
        let config = PolicyConfig::load(&path).unwrap();
        assert_eq!(config.forbidden_paths, vec!["**/.env".to_string()]);
        assert_eq!(config.max_files_touched, default_max_files());
    }
}
