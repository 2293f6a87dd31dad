// health.rs — the five typed health-check shapes a ChangePlan may declare.
//
// Modeled as a tagged union (see SPEC_FULL.md §9's "dynamic dispatch of
// health checks" note): no open-class extensibility, a fixed checker table
// maps tag to implementation in lc-executor.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HealthCheckSpec {
    HttpGet {
        url: String,
        expect_status: u16,
        #[serde(with = "duration_secs")]
        timeout: Duration,
    },
    ProcessAlive {
        process_name: String,
    },
    CommandProfile {
        profile_name: String,
    },
    Database {
        db_type: String,
        dsn: String,
        test_query: String,
    },
    FileExists {
        paths: Vec<String>,
    },
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// Closed enumeration of health-check failure codes, so reflection analysis
/// can aggregate across checks without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthErrorCode {
    HttpNon200,
    Timeout,
    ConnectRefused,
    ProcessMissing,
    CommandNonzero,
    DbUnreachable,
    FileMissing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub ok: bool,
    pub latency_ms: u64,
    pub error_code: Option<HealthErrorCode>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_get_serializes_with_kind_tag_and_integer_timeout() {
        let spec = HealthCheckSpec::HttpGet {
            url: "http://localhost:8080/health".into(),
            expect_status: 200,
            timeout: Duration::from_secs(5),
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["kind"], "http_get");
        assert_eq!(json["timeout"], 5);
    }

    #[test]
    fn file_exists_round_trips() {
        let spec = HealthCheckSpec::FileExists {
            paths: vec!["a.txt".into(), "b.txt".into()],
        };
        let json = serde_json::to_string(&spec).unwrap();
        let back: HealthCheckSpec = serde_json::from_str(&json).unwrap();
        matches!(back, HealthCheckSpec::FileExists { .. });
    }
}
