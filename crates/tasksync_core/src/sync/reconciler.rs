//! Window reconciler: merges paginated snapshots with the change feed.
//!
//! # Responsibility
//! - Drive the `Idle -> Loading -> Ready -> LoadingMore -> Ready` cycle and
//!   refreshes.
//! - Decide, per change event, whether it touches the visible window.
//! - Own the one live subscription and the record store dispatch path.
//!
//! # Invariants
//! - At most one subscription is live; it is stopped before a new one opens.
//! - Feed messages from any earlier generation never reach the record store.
//! - `Added` events only update tasks already admitted to the window;
//!   `Modified` and `Removed` apply to whatever the window holds.
//! - Fetch failures keep the current window and return to `Ready`.

use crate::config::{ConfigError, SyncConfig};
use crate::logging::{sanitize_message, MAX_LOGGED_TEXT_CHARS};
use crate::model::task::{validate_task_id, NewTask, TaskId, TaskPatch, TaskRecord};
use crate::remote::{Cursor, StoreError, TaskCollection};
use crate::sync::change_listener::{
    ActiveSubscription, ChangeEvent, ChangeListener, FeedEnvelope, FeedMessage,
};
use crate::sync::error::{
    MutationError, MutationResult, SyncError, SyncOperation, SyncResult, TaskOperation,
};
use crate::sync::page_loader::PageLoader;
use crate::sync::record_store::{RecordCommand, RecordStore};
use crate::sync::view::WindowView;
use crossbeam::channel::{unbounded, Receiver};
use log::{debug, error, info, warn};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle phase of the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Loading,
    Ready,
    LoadingMore,
    Refreshing,
    /// Terminal; every further operation is rejected.
    Disposed,
}

pub struct WindowReconciler<C: TaskCollection> {
    collection: Arc<C>,
    loader: PageLoader<C>,
    listener: ChangeListener<C>,
    events: Receiver<FeedEnvelope>,
    page_size: u32,
    store: RecordStore,
    visible_ids: HashSet<TaskId>,
    cursor: Option<Cursor>,
    phase: SyncPhase,
    generation: u64,
    subscription: Option<ActiveSubscription>,
    last_error: Option<SyncError>,
}

impl<C: TaskCollection> WindowReconciler<C> {
    pub fn new(collection: Arc<C>, config: &SyncConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (tx, events) = unbounded();
        Ok(Self {
            loader: PageLoader::new(Arc::clone(&collection), config.pagination),
            listener: ChangeListener::new(Arc::clone(&collection), tx),
            collection,
            events,
            page_size: config.page_size,
            store: RecordStore::new(),
            visible_ids: HashSet::new(),
            cursor: None,
            phase: SyncPhase::Idle,
            generation: 0,
            subscription: None,
            last_error: None,
        })
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn records(&self) -> &[TaskRecord] {
        self.store.records()
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Whether a further `load_more` may return records.
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self.phase,
            SyncPhase::Loading | SyncPhase::LoadingMore | SyncPhase::Refreshing
        )
    }

    /// Whether a change feed is currently live.
    pub fn is_listening(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn last_error(&self) -> Option<&SyncError> {
        self.last_error.as_ref()
    }

    pub fn view(&self) -> WindowView<'_> {
        WindowView {
            records: self.store.records(),
            has_more: self.has_more(),
            loading: self.is_loading(),
            listening: self.is_listening(),
            phase: self.phase,
            last_error: self.last_error.as_ref(),
        }
    }

    /// Loads the first page and opens the change feed.
    ///
    /// No-op unless the reconciler is `Idle`.
    pub fn start(&mut self) -> SyncResult<()> {
        self.ensure_alive()?;
        if self.phase != SyncPhase::Idle {
            debug!(
                "event=window_start module=sync status=skip phase={:?}",
                self.phase
            );
            return Ok(());
        }
        self.load_window(SyncOperation::Start)
    }

    /// Appends the next page. Returns `false` when pagination is exhausted.
    pub fn load_more(&mut self) -> SyncResult<bool> {
        self.ensure_alive()?;
        if self.phase != SyncPhase::Ready {
            return Err(self.reject(SyncOperation::LoadMore));
        }
        let Some(cursor) = self.cursor.clone() else {
            debug!("event=window_load_more module=sync status=skip reason=exhausted");
            return Ok(false);
        };

        self.phase = SyncPhase::LoadingMore;
        let fetched = self.loader.fetch_next_page(&cursor, self.page_size);
        self.phase = SyncPhase::Ready;
        let page = fetched.map_err(|err| self.record_failure(SyncOperation::LoadMore, err))?;

        let count = page.records.len();
        self.visible_ids
            .extend(page.records.iter().map(|record| record.id.clone()));
        let mut next = self.store.records().to_vec();
        next.extend(page.records);
        self.store.dispatch(RecordCommand::Set(next));
        self.cursor = page.next_cursor;
        // A feed fault stays surfaced until a reload resubscribes.
        self.clear_error(SyncOperation::LoadMore);

        info!(
            "event=window_load_more module=sync status=ok count={count} window_len={} has_more={}",
            self.store.len(),
            self.has_more()
        );
        Ok(true)
    }

    /// Stops the live feed and reloads the window from the first page.
    pub fn refresh(&mut self) -> SyncResult<()> {
        self.ensure_alive()?;
        if self.is_loading() {
            return Err(self.reject(SyncOperation::Refresh));
        }
        self.phase = SyncPhase::Refreshing;
        self.stop_listener();
        self.load_window(SyncOperation::Refresh)
    }

    /// Stops the change feed. The window stays readable; `start` reloads it.
    pub fn stop(&mut self) {
        if self.phase == SyncPhase::Disposed {
            return;
        }
        self.stop_listener();
        self.phase = SyncPhase::Idle;
    }

    /// Stops the change feed and rejects every further operation.
    pub fn dispose(&mut self) {
        if self.phase == SyncPhase::Disposed {
            return;
        }
        self.stop_listener();
        self.phase = SyncPhase::Disposed;
        info!("event=window_dispose module=sync status=ok");
    }

    /// Applies every queued feed message without blocking.
    ///
    /// Returns how many messages changed the window.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(envelope) = self.events.try_recv() {
            if self.handle_envelope(envelope) {
                applied += 1;
            }
        }
        applied
    }

    /// Waits up to `timeout` for one feed message, then drains the rest.
    pub fn pump_wait(&mut self, timeout: Duration) -> usize {
        match self.events.recv_timeout(timeout) {
            Ok(envelope) => usize::from(self.handle_envelope(envelope)) + self.pump(),
            Err(_) => 0,
        }
    }

    /// Creates a task remotely and places it at its ordered window position.
    ///
    /// A task sorting past the window tail while more pages exist is left for
    /// the page that covers it.
    pub fn create_task(&mut self, draft: NewTask) -> MutationResult<TaskRecord> {
        const OP: TaskOperation = TaskOperation::Create;
        self.ensure_mutable(OP, "-")?;
        self.check(OP, "-", draft.validate().map_err(MutationError::from))?;
        let created = self.collection.create(&draft).map_err(store_failure(OP));
        let id = self.check(OP, "-", created)?;

        let record = TaskRecord::from_draft(id, &draft);
        self.admit_created(&record);
        info!(
            "event=task_mutation module=sync status=ok operation={} task_id={}",
            OP.as_str(),
            record.id
        );
        Ok(record)
    }

    /// Sends only the changed fields; patches the window copy on success.
    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> MutationResult<()> {
        const OP: TaskOperation = TaskOperation::Update;
        self.ensure_mutable(OP, id)?;
        let valid = validate_task_id(id).and_then(|()| patch.validate());
        self.check(OP, id, valid.map_err(MutationError::from))?;
        let sent = self.collection.update(id, &patch).map_err(store_failure(OP));
        self.check(OP, id, sent)?;

        if let Some(current) = self.store.get(id) {
            let next = patch.apply_to(current);
            self.store.dispatch(RecordCommand::Upsert(next));
        }
        info!(
            "event=task_mutation module=sync status=ok operation={} task_id={id}",
            OP.as_str()
        );
        Ok(())
    }

    /// Flips `completed` of a visible task. Returns the new value.
    pub fn toggle_completed(&mut self, id: &str) -> MutationResult<bool> {
        const OP: TaskOperation = TaskOperation::ToggleComplete;
        self.ensure_mutable(OP, id)?;
        let current = self.store.get(id).cloned();
        let current = self.check(
            OP,
            id,
            current.ok_or_else(|| MutationError::NotInWindow(id.to_string())),
        )?;

        let patch = TaskPatch::completion(!current.completed);
        let sent = self.collection.update(id, &patch).map_err(store_failure(OP));
        self.check(OP, id, sent)?;
        self.store.dispatch(RecordCommand::Upsert(patch.apply_to(&current)));
        info!(
            "event=task_mutation module=sync status=ok operation={} task_id={id} completed={}",
            OP.as_str(),
            !current.completed
        );
        Ok(!current.completed)
    }

    pub fn delete_task(&mut self, id: &str) -> MutationResult<()> {
        const OP: TaskOperation = TaskOperation::Delete;
        self.ensure_mutable(OP, id)?;
        self.check(OP, id, validate_task_id(id).map_err(MutationError::from))?;
        let sent = self.collection.delete(id).map_err(store_failure(OP));
        self.check(OP, id, sent)?;

        self.visible_ids.remove(id);
        self.store.dispatch(RecordCommand::Remove(id.to_string()));
        info!(
            "event=task_mutation module=sync status=ok operation={} task_id={id}",
            OP.as_str()
        );
        Ok(())
    }

    fn load_window(&mut self, operation: SyncOperation) -> SyncResult<()> {
        self.phase = SyncPhase::Loading;
        let fetched = self.loader.fetch_first_page(self.page_size);
        self.phase = SyncPhase::Ready;
        let page = fetched.map_err(|err| self.record_failure(operation, err))?;

        // Set replaces wholesale, so clear and seed are one step.
        self.visible_ids = page.records.iter().map(|record| record.id.clone()).collect();
        self.cursor = page.next_cursor;
        self.store.dispatch(RecordCommand::Set(page.records));
        self.last_error = None;
        info!(
            "event=window_load module=sync status=ok operation={} count={} has_more={} generation={}",
            operation.as_str(),
            self.store.len(),
            self.has_more(),
            self.generation
        );

        let subscription = self
            .listener
            .subscribe(self.generation)
            .map_err(|err| self.record_failure(SyncOperation::Feed, err))?;
        self.subscription = Some(subscription);
        Ok(())
    }

    fn admit_created(&mut self, record: &TaskRecord) {
        if self.phase != SyncPhase::Ready {
            return;
        }
        let records = self.store.records();
        let position = records.partition_point(|existing| {
            existing.cmp_collection_order(record) == Ordering::Less
        });
        if position == records.len() && self.has_more() {
            debug!(
                "event=task_mutation module=sync status=skip reason=beyond_window task_id={}",
                record.id
            );
            return;
        }

        let mut next = Vec::with_capacity(records.len() + 1);
        next.extend_from_slice(&records[..position]);
        next.push(record.clone());
        next.extend_from_slice(&records[position..]);
        self.visible_ids.insert(record.id.clone());
        self.store.dispatch(RecordCommand::Set(next));
    }

    fn handle_envelope(&mut self, envelope: FeedEnvelope) -> bool {
        let live = self
            .subscription
            .as_ref()
            .is_some_and(|subscription| subscription.generation() == envelope.generation);
        if !live {
            debug!(
                "event=feed_event module=sync status=skip reason=stale generation={} current={}",
                envelope.generation, self.generation
            );
            return false;
        }

        match envelope.message {
            FeedMessage::Change(event) => self.apply_change(event),
            FeedMessage::Failed(err) => {
                self.stop_listener();
                self.record_failure(SyncOperation::Feed, err);
                false
            }
        }
    }

    fn apply_change(&mut self, event: ChangeEvent) -> bool {
        let kind = event.kind();
        let command = match event {
            ChangeEvent::Added(record) if self.visible_ids.contains(&record.id) => {
                RecordCommand::Upsert(record)
            }
            ChangeEvent::Modified(record) if self.store.contains(&record.id) => {
                RecordCommand::Upsert(record)
            }
            ChangeEvent::Removed(id) => {
                self.visible_ids.remove(&id);
                if !self.store.contains(&id) {
                    return false;
                }
                RecordCommand::Remove(id)
            }
            ChangeEvent::Added(_) | ChangeEvent::Modified(_) => return false,
        };

        debug!("event=feed_event module=sync status=ok kind={kind}");
        self.store.dispatch(command);
        true
    }

    /// Stops the live feed and discards anything it already queued.
    fn stop_listener(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.stop();
        }
        self.generation += 1;
        let discarded = self.events.try_iter().count();
        if discarded > 0 {
            debug!(
                "event=feed_drain module=sync status=ok discarded={discarded} generation={}",
                self.generation
            );
        }
    }

    fn record_failure(&mut self, operation: SyncOperation, source: StoreError) -> SyncError {
        error!(
            "event=window_sync module=sync status=error operation={} error_kind={} error_code={} retryable={} error={}",
            operation.as_str(),
            source.category(),
            source.code(),
            source.is_retryable(),
            sanitize_message(source.message(), MAX_LOGGED_TEXT_CHARS)
        );
        let err = SyncError::Store { operation, source };
        self.last_error = Some(err.clone());
        err
    }

    fn clear_error(&mut self, operation: SyncOperation) {
        if self
            .last_error
            .as_ref()
            .is_some_and(|err| err.operation() == Some(operation))
        {
            self.last_error = None;
        }
    }

    fn reject(&self, operation: SyncOperation) -> SyncError {
        warn!(
            "event=window_sync module=sync status=error operation={} error_kind=invalid_phase phase={:?}",
            operation.as_str(),
            self.phase
        );
        SyncError::InvalidPhase {
            operation,
            phase: self.phase,
        }
    }

    fn ensure_alive(&self) -> SyncResult<()> {
        if self.phase == SyncPhase::Disposed {
            return Err(SyncError::Disposed);
        }
        Ok(())
    }

    fn ensure_mutable(&self, operation: TaskOperation, task_id: &str) -> MutationResult<()> {
        if self.phase == SyncPhase::Disposed {
            return self.check(operation, task_id, Err(MutationError::Disposed));
        }
        Ok(())
    }

    /// Logs a failed mutation with category and code, then hands it back.
    fn check<T>(
        &self,
        operation: TaskOperation,
        task_id: &str,
        result: MutationResult<T>,
    ) -> MutationResult<T> {
        if let Err(err) = &result {
            warn!(
                "event=task_mutation module=sync status=error operation={} task_id={task_id} error_kind={} error_code={} error={}",
                operation.as_str(),
                err.category(),
                err.code(),
                sanitize_message(&err.to_string(), MAX_LOGGED_TEXT_CHARS)
            );
        }
        result
    }
}

impl<C: TaskCollection> Drop for WindowReconciler<C> {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.stop();
        }
    }
}

fn store_failure(operation: TaskOperation) -> impl Fn(StoreError) -> MutationError {
    move |source| MutationError::Store { operation, source }
}
