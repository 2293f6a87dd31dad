//! The Execution Store: a `rusqlite`-backed system of record for
//! executions, their per-step durable log, approvals, and lineage queries.

pub mod error;
pub mod migrations;
pub mod models;
pub mod store;

pub use error::StoreError;
pub use models::{ExecutionRecord, ExecutionStatus, ExecutionStep, Lineage, Statistics, StoredApproval, TriggerKind};
pub use store::{ExecutionStore, ListFilters};
