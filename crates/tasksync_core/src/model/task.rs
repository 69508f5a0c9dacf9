//! Task record, creation draft and partial update patch.
//!
//! # Responsibility
//! - Define the record shape mirrored from the remote collection.
//! - Reject malformed input locally, before anything reaches the remote store.
//!
//! # Invariants
//! - `id` and `created_at` are immutable once the record exists.
//! - A `TaskPatch` carries only the fields that change.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Remote-assigned task identifier.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type TaskId = String;

/// One task as delivered by the remote collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub owner_id: String,
    /// Unix epoch milliseconds. Collection order is `created_at DESC`.
    pub created_at: i64,
}

impl TaskRecord {
    /// Materializes a record from a draft once the remote store assigned an id.
    pub fn from_draft(id: impl Into<TaskId>, draft: &NewTask) -> Self {
        Self {
            id: id.into(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            completed: false,
            owner_id: draft.owner_id.clone(),
            created_at: draft.created_at,
        }
    }

    /// Collection order: newest first, ties by ascending id.
    pub fn cmp_collection_order(&self, other: &Self) -> Ordering {
        other
            .created_at
            .cmp(&self.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Returns whether `term` occurs in title or description, ignoring case.
    pub fn matches_search(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }
}

/// Local validation failures. These never reach the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyTitle,
    EmptyOwner,
    EmptyTaskId,
    EmptyPatch,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "Task title cannot be empty."),
            Self::EmptyOwner => write!(f, "Task owner cannot be empty."),
            Self::EmptyTaskId => write!(f, "Task id cannot be empty."),
            Self::EmptyPatch => write!(f, "Task update does not change any field."),
        }
    }
}

impl Error for TaskValidationError {}

/// Input for creating a task. The id is assigned remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub created_at: i64,
}

impl NewTask {
    /// Creates a draft stamped with the current wall-clock time.
    pub fn new(
        owner_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            title: title.into(),
            description: description.into(),
            created_at: now_epoch_ms(),
        }
    }

    /// Overrides the creation timestamp; used by import paths and tests.
    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        if self.owner_id.trim().is_empty() {
            return Err(TaskValidationError::EmptyOwner);
        }
        Ok(())
    }
}

/// Partial update. `None` fields are left untouched remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    /// Patch that edits the user-visible text fields.
    pub fn edit(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
            completed: None,
        }
    }

    /// Patch that only sets the completion flag.
    pub fn completion(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.completed.is_none()
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.is_empty() {
            return Err(TaskValidationError::EmptyPatch);
        }
        if matches!(self.title.as_deref(), Some(title) if title.trim().is_empty()) {
            return Err(TaskValidationError::EmptyTitle);
        }
        Ok(())
    }

    /// Returns a copy of `record` with this patch applied.
    pub fn apply_to(&self, record: &TaskRecord) -> TaskRecord {
        let mut next = record.clone();
        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        if let Some(completed) = self.completed {
            next.completed = completed;
        }
        next
    }
}

pub(crate) fn validate_task_id(id: &str) -> Result<(), TaskValidationError> {
    if id.trim().is_empty() {
        return Err(TaskValidationError::EmptyTaskId);
    }
    Ok(())
}

pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
