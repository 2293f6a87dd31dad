use thiserror::Error;

/// Errors raised by path/checksum primitives shared across crates.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("path `{path}` escapes the workspace root")]
    PathEscape { path: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The closed error taxonomy every crate-local error ultimately maps onto.
///
/// Each domain crate owns its own `thiserror` enum (`PolicyError`,
/// `ExecutorError`, ...); `code()` on that enum returns one of these so
/// callers outside the core (CLI, reflection, artifact records) can reason
/// about failures without matching on every crate's concrete error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidInput,
    NotApproved,
    Tampered,
    PathViolation,
    StaleUpdate,
    ApplyFailed,
    VerifyFailed,
    HealthFailed,
    Timeout,
    RollbackFailed,
    Internal,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::InvalidInput => "invalid_input",
            ErrorCode::NotApproved => "not_approved",
            ErrorCode::Tampered => "tampered",
            ErrorCode::PathViolation => "path_violation",
            ErrorCode::StaleUpdate => "stale_update",
            ErrorCode::ApplyFailed => "apply_failed",
            ErrorCode::VerifyFailed => "verify_failed",
            ErrorCode::HealthFailed => "health_failed",
            ErrorCode::Timeout => "timeout",
            ErrorCode::RollbackFailed => "rollback_failed",
            ErrorCode::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

/// Whether a terminal step failure should trigger the rollback handler.
impl ErrorCode {
    pub fn triggers_rollback(self) -> bool {
        matches!(
            self,
            ErrorCode::ApplyFailed
                | ErrorCode::VerifyFailed
                | ErrorCode::HealthFailed
                | ErrorCode::Timeout
                | ErrorCode::Internal
        )
    }
}
