//! Scripted in-memory task collection for fault-injection tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tasksync_core::{
    ChangeSink, NewTask, PageQuery, RemoteChange, StoreError, StoreResult, SubscriptionHandle,
    TaskCollection, TaskId, TaskPatch, TaskRecord,
};

/// Task `n` of a collection ordered newest first: `r1` is the newest.
pub fn task(n: u32) -> TaskRecord {
    TaskRecord {
        id: format!("r{n}"),
        title: format!("Task {n}"),
        description: format!("description {n}"),
        completed: false,
        owner_id: "owner-1".to_string(),
        created_at: 10_000 - i64::from(n),
    }
}

pub fn tasks(range: std::ops::RangeInclusive<u32>) -> Vec<TaskRecord> {
    range.map(task).collect()
}

pub fn ids(records: &[TaskRecord]) -> Vec<String> {
    records.iter().map(|record| record.id.clone()).collect()
}

pub fn expected_ids(range: std::ops::RangeInclusive<u32>) -> Vec<String> {
    range.map(|n| format!("r{n}")).collect()
}

#[derive(Default)]
struct State {
    records: Vec<TaskRecord>,
    query_failures: VecDeque<StoreError>,
    write_failures: VecDeque<StoreError>,
    live: BTreeMap<u64, Arc<dyn ChangeSink>>,
    retired: BTreeMap<u64, Arc<dyn ChangeSink>>,
    next_subscription_id: u64,
    next_task_id: u64,
    queries: usize,
    writes: usize,
}

impl State {
    fn sort(&mut self) {
        self.records.sort_by(TaskRecord::cmp_collection_order);
    }

    fn broadcast(&mut self, change: RemoteChange) {
        self.live.retain(|_, sink| sink.on_change(change.clone()));
    }
}

/// Collection whose failures and feed traffic are driven by the test.
#[derive(Default)]
pub struct ScriptedCollection {
    state: Arc<Mutex<State>>,
}

impl ScriptedCollection {
    pub fn with_tasks(records: Vec<TaskRecord>) -> Arc<Self> {
        let collection = Self::default();
        {
            let mut state = collection.state.lock();
            state.records = records;
            state.sort();
        }
        Arc::new(collection)
    }

    pub fn fail_next_query(&self, error: StoreError) {
        self.state.lock().query_failures.push_back(error);
    }

    pub fn fail_next_write(&self, error: StoreError) {
        self.state.lock().write_failures.push_back(error);
    }

    /// Pushes `change` to every live subscription without touching records.
    pub fn emit(&self, change: RemoteChange) {
        self.state.lock().broadcast(change);
    }

    /// Pushes `change` to a subscription even after it was cancelled, the way
    /// a late network delivery would.
    pub fn emit_to(&self, subscription_id: u64, change: RemoteChange) {
        let state = self.state.lock();
        let sink = state
            .live
            .get(&subscription_id)
            .or_else(|| state.retired.get(&subscription_id))
            .cloned();
        drop(state);
        if let Some(sink) = sink {
            sink.on_change(change);
        }
    }

    /// Reports a terminal error on every live subscription.
    pub fn fail_feed(&self, error: StoreError) {
        let sinks: Vec<_> = self.state.lock().live.values().cloned().collect();
        for sink in sinks {
            sink.on_error(error.clone());
        }
    }

    pub fn live_subscriptions(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn last_subscription_id(&self) -> u64 {
        self.state.lock().next_subscription_id
    }

    pub fn query_count(&self) -> usize {
        self.state.lock().queries
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }

    /// Replaces a stored record without emitting a change.
    pub fn replace_silently(&self, record: TaskRecord) {
        let mut state = self.state.lock();
        state.records.retain(|existing| existing.id != record.id);
        state.records.push(record);
        state.sort();
    }
}

impl TaskCollection for ScriptedCollection {
    fn query(&self, query: &PageQuery) -> StoreResult<Vec<TaskRecord>> {
        let mut state = self.state.lock();
        state.queries += 1;
        if let Some(error) = state.query_failures.pop_front() {
            return Err(error);
        }

        let start = match &query.start_after {
            None => 0,
            Some(cursor) => state
                .records
                .iter()
                .position(|record| {
                    record.created_at < cursor.created_at()
                        || (record.created_at == cursor.created_at()
                            && record.id.as_str() > cursor.task_id())
                })
                .unwrap_or(state.records.len()),
        };
        let limit = usize::try_from(query.limit).expect("limit fits usize");
        Ok(state.records.iter().skip(start).take(limit).cloned().collect())
    }

    fn subscribe(&self, sink: Arc<dyn ChangeSink>) -> StoreResult<SubscriptionHandle> {
        let mut state = self.state.lock();
        state.next_subscription_id += 1;
        let subscription_id = state.next_subscription_id;
        state.live.insert(subscription_id, Arc::clone(&sink));

        let shared = Arc::clone(&self.state);
        Ok(SubscriptionHandle::new(subscription_id, move || {
            let mut state = shared.lock();
            if let Some(sink) = state.live.remove(&subscription_id) {
                state.retired.insert(subscription_id, sink);
            }
        }))
    }

    fn create(&self, draft: &NewTask) -> StoreResult<TaskId> {
        let mut state = self.state.lock();
        state.writes += 1;
        if let Some(error) = state.write_failures.pop_front() {
            return Err(error);
        }
        state.next_task_id += 1;
        let record = TaskRecord::from_draft(format!("new-{}", state.next_task_id), draft);
        state.records.push(record.clone());
        state.sort();
        state.broadcast(RemoteChange::added(record.clone()));
        Ok(record.id)
    }

    fn update(&self, id: &str, patch: &TaskPatch) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.writes += 1;
        if let Some(error) = state.write_failures.pop_front() {
            return Err(error);
        }
        let Some(existing) = state.records.iter_mut().find(|record| record.id == id) else {
            return Err(StoreError::not_found(format!("no task {id}")));
        };
        *existing = patch.apply_to(existing);
        let updated = existing.clone();
        state.broadcast(RemoteChange::modified(updated));
        Ok(())
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.writes += 1;
        if let Some(error) = state.write_failures.pop_front() {
            return Err(error);
        }
        let Some(index) = state.records.iter().position(|record| record.id == id) else {
            return Err(StoreError::not_found(format!("no task {id}")));
        };
        let removed = state.records.remove(index);
        state.broadcast(RemoteChange::removed(removed));
        Ok(())
    }
}
