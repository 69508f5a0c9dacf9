//! Page query and cursor types.

use crate::model::task::{TaskId, TaskRecord};

/// Opaque position in the remote order: "continue after this record".
///
/// Collections compare against `(created_at DESC, id ASC)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    created_at: i64,
    task_id: TaskId,
}

impl Cursor {
    /// Cursor positioned on `record`; the next page starts right after it.
    pub fn after(record: &TaskRecord) -> Self {
        Self {
            created_at: record.created_at,
            task_id: record.id.clone(),
        }
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

/// One ordered, limited read. Order is always `created_at DESC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub limit: u32,
    pub start_after: Option<Cursor>,
}

impl PageQuery {
    pub fn first(limit: u32) -> Self {
        Self {
            limit,
            start_after: None,
        }
    }

    pub fn after(cursor: Cursor, limit: u32) -> Self {
        Self {
            limit,
            start_after: Some(cursor),
        }
    }
}
