//! Shared primitives for the governed change execution core: path
//! canonicalization, checksum hashing, and the closed error taxonomy.

pub mod error;
pub mod hasher;
pub mod path;

pub use error::{CoreError, ErrorCode};
pub use path::RelPath;
