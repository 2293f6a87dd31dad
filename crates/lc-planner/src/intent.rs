// intent.rs — the closed set of intent types §4.1 drives risk shaping from.

use serde::{Deserialize, Serialize};

use lc_changeset::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    FixBug,
    AddFeature,
    UpdateDocs,
    Optimize,
    Investigate,
    Refactor,
}

impl IntentType {
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "fix_bug" => IntentType::FixBug,
            "add_feature" => IntentType::AddFeature,
            "update_docs" => IntentType::UpdateDocs,
            "optimize" => IntentType::Optimize,
            "investigate" => IntentType::Investigate,
            "refactor" => IntentType::Refactor,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IntentType::FixBug => "fix_bug",
            IntentType::AddFeature => "add_feature",
            IntentType::UpdateDocs => "update_docs",
            IntentType::Optimize => "optimize",
            IntentType::Investigate => "investigate",
            IntentType::Refactor => "refactor",
        }
    }

    /// Baseline risk before path-based escalation. Documentation-only
    /// updates and read-only investigation default to low risk; everything
    /// else that touches code defaults to medium.
    pub fn baseline_risk(self) -> RiskLevel {
        match self {
            IntentType::UpdateDocs | IntentType::Investigate => RiskLevel::Low,
            IntentType::FixBug | IntentType::AddFeature | IntentType::Optimize | IntentType::Refactor => {
                RiskLevel::Medium
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docs_only_intent_defaults_low_risk() {
        assert_eq!(IntentType::UpdateDocs.baseline_risk(), RiskLevel::Low);
    }

    #[test]
    fn fix_bug_defaults_medium_risk() {
        assert_eq!(IntentType::FixBug.baseline_risk(), RiskLevel::Medium);
    }

    #[test]
    fn parse_round_trips_through_as_str() {
        for intent in [
            IntentType::FixBug,
            IntentType::AddFeature,
            IntentType::UpdateDocs,
            IntentType::Optimize,
            IntentType::Investigate,
            IntentType::Refactor,
        ] {
            assert_eq!(IntentType::parse(intent.as_str()), Some(intent));
        }
    }

    #[test]
    fn parse_rejects_unknown_intent() {
        assert_eq!(IntentType::parse("time_travel"), None);
    }
}
