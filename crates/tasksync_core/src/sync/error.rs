//! Error types for window operations and single-record mutations.
//!
//! Every error maps to a human-readable message for the presentation layer.

use crate::model::task::{TaskId, TaskValidationError};
use crate::remote::StoreError;
use crate::sync::reconciler::SyncPhase;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SyncResult<T> = Result<T, SyncError>;
pub type MutationResult<T> = Result<T, MutationError>;

const UNAVAILABLE_MESSAGE: &str = "Task service is currently unavailable. Please try again later.";
const TIMEOUT_MESSAGE: &str = "Request took too long. Please check your network connection.";
const NOT_FOUND_MESSAGE: &str = "Task not found. It might have been deleted already.";

/// Window-level operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    Start,
    LoadMore,
    Refresh,
    Feed,
}

impl SyncOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::LoadMore => "load_more",
            Self::Refresh => "refresh",
            Self::Feed => "feed",
        }
    }

    fn failure_message(self) -> &'static str {
        match self {
            Self::Start | Self::Refresh => "Failed to fetch tasks",
            Self::LoadMore => "Failed to load more tasks",
            Self::Feed => "Failed to sync tasks",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Page loader or change feed failure.
    Store {
        operation: SyncOperation,
        source: StoreError,
    },
    /// Operation not allowed in the current phase.
    InvalidPhase {
        operation: SyncOperation,
        phase: SyncPhase,
    },
    /// The reconciler was disposed.
    Disposed,
}

impl SyncError {
    /// Operation that failed; `None` for `Disposed`.
    pub fn operation(&self) -> Option<SyncOperation> {
        match self {
            Self::Store { operation, .. } | Self::InvalidPhase { operation, .. } => {
                Some(*operation)
            }
            Self::Disposed => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store { source, .. } => source.is_retryable(),
            Self::InvalidPhase { .. } => true,
            Self::Disposed => false,
        }
    }

    /// Message suitable for direct display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Store { operation, source } => {
                let base = operation.failure_message();
                match source {
                    StoreError::Transient { .. } => format!("{base}. Please try again."),
                    StoreError::Permission { .. } => {
                        format!("{base}. You do not have permission to view tasks.")
                    }
                    _ => base.to_string(),
                }
            }
            Self::InvalidPhase { .. } => "Tasks are still loading.".to_string(),
            Self::Disposed => "Task list is closed.".to_string(),
        }
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store { operation, source } => {
                write!(f, "{} failed: {source}", operation.as_str())
            }
            Self::InvalidPhase { operation, phase } => {
                write!(f, "{} is not allowed while {phase:?}", operation.as_str())
            }
            Self::Disposed => write!(f, "reconciler is disposed"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Single-record operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOperation {
    Create,
    Update,
    ToggleComplete,
    Delete,
}

impl TaskOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::ToggleComplete => "toggle_complete",
            Self::Delete => "delete",
        }
    }

    fn permission_message(self) -> &'static str {
        match self {
            Self::Create => "You do not have permission to create tasks.",
            Self::Update => "You do not have permission to update tasks.",
            Self::ToggleComplete => "You do not have permission to update task status.",
            Self::Delete => "You do not have permission to delete tasks.",
        }
    }

    fn fallback_message(self) -> &'static str {
        match self {
            Self::Create => "Failed to create task. Please try again later.",
            Self::Update => "Failed to update task. Please try again later.",
            Self::ToggleComplete => "Failed to toggle task completion. Please try again later.",
            Self::Delete => "Failed to delete task. Please try again later.",
        }
    }
}

/// Failure of one create/update/toggle/delete. Never affects sync state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    /// Rejected locally; nothing was sent.
    Validation(TaskValidationError),
    /// Toggle targets a task that is not in the window.
    NotInWindow(TaskId),
    Store {
        operation: TaskOperation,
        source: StoreError,
    },
    Disposed,
}

impl MutationError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::NotInWindow(_) => NOT_FOUND_MESSAGE.to_string(),
            Self::Store { operation, source } => match source {
                StoreError::Permission { .. } => operation.permission_message().to_string(),
                StoreError::NotFound { .. } => NOT_FOUND_MESSAGE.to_string(),
                StoreError::Transient { code, .. } if code == "deadline-exceeded" => {
                    TIMEOUT_MESSAGE.to_string()
                }
                StoreError::Transient { .. } => UNAVAILABLE_MESSAGE.to_string(),
                StoreError::Other { code, .. } if code == "invalid-argument" => {
                    "Invalid data provided. Please check your inputs.".to_string()
                }
                StoreError::Other { .. } => operation.fallback_message().to_string(),
            },
            Self::Disposed => "Task list is closed.".to_string(),
        }
    }

    /// Remote code, or a local code for failures that never left the client.
    pub fn code(&self) -> &str {
        match self {
            Self::Validation(_) => "invalid-input",
            Self::NotInWindow(_) => "not-in-window",
            Self::Store { source, .. } => source.code(),
            Self::Disposed => "disposed",
        }
    }

    /// Stable category name used in log lines.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotInWindow(_) => "not_in_window",
            Self::Store { source, .. } => source.category(),
            Self::Disposed => "disposed",
        }
    }
}

impl Display for MutationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotInWindow(id) => write!(f, "task not in window: {id}"),
            Self::Store { operation, source } => {
                write!(f, "{} failed: {source}", operation.as_str())
            }
            Self::Disposed => write!(f, "reconciler is disposed"),
        }
    }
}

impl Error for MutationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for MutationError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}
