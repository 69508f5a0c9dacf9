//! Change feed subscription and event classification.
//!
//! # Responsibility
//! - Subscribe to the whole collection and push typed events onto the
//!   reconciler's channel, one message per remote change.
//! - Tag each message with the generation of the subscription that
//!   produced it.
//!
//! # Invariants
//! - A sink forwards at most one error and nothing after it.
//! - A stopped subscription forwards nothing, even if the remote side keeps
//!   calling the sink.

use crate::model::task::{TaskId, TaskRecord};
use crate::remote::{
    ChangeKind, ChangeSink, RemoteChange, StoreError, StoreResult, SubscriptionHandle,
    TaskCollection,
};
use crossbeam::channel::Sender;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Classified change, consumed once by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Added(TaskRecord),
    Modified(TaskRecord),
    Removed(TaskId),
}

impl ChangeEvent {
    pub fn classify(change: RemoteChange) -> Self {
        match change.kind {
            ChangeKind::Added => Self::Added(change.record),
            ChangeKind::Modified => Self::Modified(change.record),
            ChangeKind::Removed => Self::Removed(change.record.id),
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            Self::Added(record) | Self::Modified(record) => &record.id,
            Self::Removed(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Modified(_) => "modified",
            Self::Removed(_) => "removed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    Change(ChangeEvent),
    /// Terminal failure; the subscription is dead afterwards.
    Failed(StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEnvelope {
    pub generation: u64,
    pub message: FeedMessage,
}

struct ChannelSink {
    generation: u64,
    tx: Sender<FeedEnvelope>,
    closed: AtomicBool,
}

impl ChannelSink {
    fn push(&self, message: FeedMessage) -> bool {
        self.tx
            .send(FeedEnvelope {
                generation: self.generation,
                message,
            })
            .is_ok()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl ChangeSink for ChannelSink {
    fn on_change(&self, change: RemoteChange) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.push(FeedMessage::Change(ChangeEvent::classify(change)))
    }

    fn on_error(&self, error: StoreError) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!(
            "event=feed_error module=sync status=error generation={} error_kind={} error_code={}",
            self.generation,
            error.category(),
            error.code()
        );
        self.push(FeedMessage::Failed(error));
    }
}

/// One live change feed owned by the reconciler.
pub struct ActiveSubscription {
    generation: u64,
    sink: Arc<ChannelSink>,
    handle: SubscriptionHandle,
}

impl ActiveSubscription {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Closes the sink first, then cancels the remote subscription.
    pub fn stop(self) {
        self.sink.close();
        let subscription_id = self.handle.id();
        self.handle.unsubscribe();
        info!(
            "event=feed_stop module=sync status=ok generation={} subscription_id={subscription_id}",
            self.generation
        );
    }
}

pub struct ChangeListener<C> {
    collection: Arc<C>,
    tx: Sender<FeedEnvelope>,
}

impl<C: TaskCollection> ChangeListener<C> {
    pub fn new(collection: Arc<C>, tx: Sender<FeedEnvelope>) -> Self {
        Self { collection, tx }
    }

    /// Opens a feed whose messages carry `generation`.
    pub fn subscribe(&self, generation: u64) -> StoreResult<ActiveSubscription> {
        let sink = Arc::new(ChannelSink {
            generation,
            tx: self.tx.clone(),
            closed: AtomicBool::new(false),
        });
        let handle = self.collection.subscribe(sink.clone())?;
        info!(
            "event=feed_start module=sync status=ok generation={generation} subscription_id={}",
            handle.id()
        );
        Ok(ActiveSubscription {
            generation,
            sink,
            handle,
        })
    }
}
