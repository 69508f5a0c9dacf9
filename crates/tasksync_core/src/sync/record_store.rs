//! Visible-window record store and its reducer.
//!
//! # Invariants
//! - No two records share an id, for any sequence of commands.
//! - `Upsert` and `Remove` are idempotent.
//! - `Upsert` of a known id keeps the record's position.

use crate::model::task::{TaskId, TaskRecord};

/// Mutation commands accepted by the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordCommand {
    /// Replace the whole sequence. Later duplicates overwrite the content of
    /// the first occurrence and keep its position.
    Set(Vec<TaskRecord>),
    /// Replace in place when the id exists, append otherwise.
    Upsert(TaskRecord),
    /// Drop the record with this id if present.
    Remove(TaskId),
}

/// Applies one command to `state` and returns the next state.
pub fn apply(mut state: Vec<TaskRecord>, command: RecordCommand) -> Vec<TaskRecord> {
    match command {
        RecordCommand::Set(records) => {
            let mut next = Vec::with_capacity(records.len());
            for record in records {
                upsert(&mut next, record);
            }
            next
        }
        RecordCommand::Upsert(record) => {
            upsert(&mut state, record);
            state
        }
        RecordCommand::Remove(id) => {
            state.retain(|record| record.id != id);
            state
        }
    }
}

fn upsert(state: &mut Vec<TaskRecord>, record: TaskRecord) {
    match state.iter_mut().find(|existing| existing.id == record.id) {
        Some(existing) => *existing = record,
        None => state.push(record),
    }
}

/// Ordered records the user currently sees.
///
/// Only the reconciler's dispatch path mutates it; everyone else reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordStore {
    records: Vec<TaskRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&TaskRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn dispatch(&mut self, command: RecordCommand) {
        let state = std::mem::take(&mut self.records);
        self.records = apply(state, command);
    }
}
