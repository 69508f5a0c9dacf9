//! Change feed primitives: raw remote changes, the sink callback contract
//! and the subscription handle.

use crate::model::task::TaskRecord;
use crate::remote::error::StoreError;
use std::fmt::{Debug, Formatter};

/// Remote change type, as reported by the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One raw change notification. `Removed` still carries the last known record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteChange {
    pub kind: ChangeKind,
    pub record: TaskRecord,
}

impl RemoteChange {
    pub fn added(record: TaskRecord) -> Self {
        Self {
            kind: ChangeKind::Added,
            record,
        }
    }

    pub fn modified(record: TaskRecord) -> Self {
        Self {
            kind: ChangeKind::Modified,
            record,
        }
    }

    pub fn removed(record: TaskRecord) -> Self {
        Self {
            kind: ChangeKind::Removed,
            record,
        }
    }
}

/// Receiving side of a subscription, called by the collection.
pub trait ChangeSink: Send + Sync {
    /// Delivers one change. Returns `false` once the sink no longer accepts
    /// events, so the collection can drop it.
    fn on_change(&self, change: RemoteChange) -> bool;

    /// Reports the terminal failure of the subscription.
    fn on_error(&self, error: StoreError);
}

type CancelFn = Box<dyn FnOnce() + Send>;

/// Ownership token for one live subscription.
///
/// Dropping the handle cancels the subscription.
pub struct SubscriptionHandle {
    id: u64,
    cancel: Option<CancelFn>,
}

impl SubscriptionHandle {
    pub fn new(id: u64, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancels the subscription synchronously.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("live", &self.cancel.is_some())
            .finish()
    }
}
