//! Local implementations of the remote collection contract.
//!
//! # Responsibility
//! - Provide a SQLite-backed `TaskCollection` for local runs and tests.
//! - Keep SQL details out of the sync engine.
//!
//! # Invariants
//! - Every committed write is broadcast to live subscribers in commit order.

pub mod task_repo;
