use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invalid intent: {0}")]
    InvalidIntent(String),

    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: String, to: String },

    #[error("state `{state}` does not permit tool category `{tool}`")]
    ToolNotPermitted { state: String, tool: String },
}
