//! Read-only window snapshot for the presentation layer.

use crate::model::task::TaskRecord;
use crate::sync::error::SyncError;
use crate::sync::reconciler::SyncPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowView<'a> {
    pub records: &'a [TaskRecord],
    pub has_more: bool,
    pub loading: bool,
    pub listening: bool,
    pub phase: SyncPhase,
    pub last_error: Option<&'a SyncError>,
}

impl<'a> WindowView<'a> {
    /// Visible records whose title or description contains `term`.
    ///
    /// A blank term keeps every record.
    pub fn filtered(&self, term: &str) -> Vec<&'a TaskRecord> {
        self.records
            .iter()
            .filter(|record| record.matches_search(term))
            .collect()
    }

    /// Human-readable text for the last window-level error, if any.
    pub fn error_message(&self) -> Option<String> {
        self.last_error.map(SyncError::user_message)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
