// result.rs — ExecutionResult: the structured outcome every pipeline run
// returns. Failures are never thrown past the Executor boundary (§7's
// propagation policy) — they are caught, recorded, and folded into this
// type instead.

use serde::{Deserialize, Serialize};

use lc_core::ErrorCode;
use lc_store::ExecutionStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub verification_passed: Option<bool>,
    pub health_passed: Option<bool>,
    pub error_code: Option<ErrorCode>,
    pub error_step: Option<String>,
    pub error_message: Option<String>,
    pub rolled_back: bool,
    pub artifact_path: String,
}

impl ExecutionResult {
    pub fn completed(execution_id: impl Into<String>, artifact_path: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            status: ExecutionStatus::Completed,
            verification_passed: Some(true),
            health_passed: Some(true),
            error_code: None,
            error_step: None,
            error_message: None,
            rolled_back: false,
            artifact_path: artifact_path.into(),
        }
    }

    pub fn failed(
        execution_id: impl Into<String>,
        artifact_path: impl Into<String>,
        error_code: ErrorCode,
        error_step: impl Into<String>,
        error_message: impl Into<String>,
        rolled_back: bool,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            status: if rolled_back {
                ExecutionStatus::RolledBack
            } else {
                ExecutionStatus::Failed
            },
            verification_passed: None,
            health_passed: None,
            error_code: Some(error_code),
            error_step: Some(error_step.into()),
            error_message: Some(error_message.into()),
            rolled_back,
            artifact_path: artifact_path.into(),
        }
    }
}
