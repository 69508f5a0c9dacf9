//! Window synchronization engine.
//!
//! # Responsibility
//! - Keep the locally visible window consistent with the remote collection
//!   under paginated fetches and the streamed change feed.
//! - Expose the window read-only; only the reconciler mutates it.
//!
//! # Invariants
//! - All window mutations run on the thread that owns the reconciler, one
//!   feed message at a time, in delivery order.
//! - A refresh or disposal stops the old feed before a new one is opened.

pub mod change_listener;
pub mod error;
pub mod page_loader;
pub mod reconciler;
pub mod record_store;
pub mod view;
