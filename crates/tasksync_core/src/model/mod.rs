//! Task domain model shared by the remote contracts and the sync engine.
//!
//! # Responsibility
//! - Define the canonical task record and its write-side inputs.
//! - Keep local input validation next to the data it guards.
//!
//! # Invariants
//! - A task id is assigned by the remote store and never changes.
//! - `created_at` is fixed at creation and defines the collection order.

pub mod task;
