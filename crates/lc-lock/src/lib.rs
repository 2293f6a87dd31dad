//! The Lock Manager: a process-safe, machine-local mutex scoped to one
//! workspace, enforcing that the Executor pipeline never runs concurrently
//! against the same repo.

pub mod error;
pub mod manager;

pub use error::LockError;
pub use manager::{LockGuard, LockManager, LockMetadata};
