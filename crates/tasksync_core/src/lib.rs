//! Core of the task window synchronization client.
//!
//! The crate keeps an ordered, paginated window over a remote task
//! collection and reconciles it with the collection's change feed.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod remote;
pub mod repo;
pub mod sync;

pub use config::{ConfigError, PaginationMode, SyncConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::task::{NewTask, TaskId, TaskPatch, TaskRecord, TaskValidationError};
pub use remote::{
    ChangeKind, ChangeSink, Cursor, PageQuery, RemoteChange, StoreError, StoreResult,
    SubscriptionHandle, TaskCollection,
};
pub use repo::task_repo::SqliteTaskCollection;
pub use sync::change_listener::{ChangeEvent, ChangeListener, FeedEnvelope, FeedMessage};
pub use sync::error::{
    MutationError, MutationResult, SyncError, SyncOperation, SyncResult, TaskOperation,
};
pub use sync::page_loader::{Page, PageLoader};
pub use sync::reconciler::{SyncPhase, WindowReconciler};
pub use sync::record_store::{RecordCommand, RecordStore};
pub use sync::view::WindowView;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
