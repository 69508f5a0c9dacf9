//! Contracts consumed from the remote task collection.
//!
//! # Responsibility
//! - Describe the three read primitives (page query, cursor continuation,
//!   change subscription) and the three write primitives the engine uses.
//! - Classify remote failures into the categories the engine reacts to.
//!
//! # Invariants
//! - Query results are ordered by `created_at DESC` with a stable tie-break.
//! - A subscription reports at most one error, after which it is dead.
//! - Events for the same task id are delivered in source order.

pub mod error;
pub mod feed;
pub mod page;

use crate::model::task::{NewTask, TaskId, TaskPatch, TaskRecord};
use std::sync::Arc;

pub use error::{StoreError, StoreResult};
pub use feed::{ChangeKind, ChangeSink, RemoteChange, SubscriptionHandle};
pub use page::{Cursor, PageQuery};

/// Remote task collection as seen by the sync engine.
///
/// Implementations own transport, authentication and storage details.
pub trait TaskCollection {
    /// Returns at most `query.limit` records, continuing after
    /// `query.start_after` when set.
    fn query(&self, query: &PageQuery) -> StoreResult<Vec<TaskRecord>>;

    /// Starts a change feed over the whole collection.
    ///
    /// The feed stays live until the returned handle is dropped or
    /// unsubscribed, or until the sink receives an error.
    fn subscribe(&self, sink: Arc<dyn ChangeSink>) -> StoreResult<SubscriptionHandle>;

    fn create(&self, draft: &NewTask) -> StoreResult<TaskId>;
    fn update(&self, id: &str, patch: &TaskPatch) -> StoreResult<()>;
    fn delete(&self, id: &str) -> StoreResult<()>;
}
