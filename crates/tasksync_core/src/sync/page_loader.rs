//! One-shot ordered page fetches.
//!
//! # Invariants
//! - Pages hold at most `page_size` records in `created_at DESC` order.
//! - `next_cursor` is set only when the loader believes more records exist.

use crate::config::PaginationMode;
use crate::model::task::TaskRecord;
use crate::remote::{Cursor, PageQuery, StoreResult, TaskCollection};
use log::{debug, warn};
use std::sync::Arc;

/// One fetched page plus the continuation cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<TaskRecord>,
    pub next_cursor: Option<Cursor>,
}

impl Page {
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

pub struct PageLoader<C> {
    collection: Arc<C>,
    mode: PaginationMode,
}

impl<C: TaskCollection> PageLoader<C> {
    pub fn new(collection: Arc<C>, mode: PaginationMode) -> Self {
        Self { collection, mode }
    }

    pub fn fetch_first_page(&self, page_size: u32) -> StoreResult<Page> {
        let query = PageQuery::first(self.query_limit(page_size));
        self.fetch("first", &query, page_size)
    }

    pub fn fetch_next_page(&self, cursor: &Cursor, page_size: u32) -> StoreResult<Page> {
        let query = PageQuery::after(cursor.clone(), self.query_limit(page_size));
        self.fetch("next", &query, page_size)
    }

    /// Look-ahead asks for one extra record past the page.
    fn query_limit(&self, page_size: u32) -> u32 {
        match self.mode {
            PaginationMode::ShortPage => page_size,
            PaginationMode::LookAhead => page_size.saturating_add(1),
        }
    }

    fn fetch(&self, page_kind: &str, query: &PageQuery, page_size: u32) -> StoreResult<Page> {
        let mut records = self
            .collection
            .query(query)
            .inspect_err(|err| {
                warn!(
                    "event=page_fetch module=sync status=error page={page_kind} error_kind={} error_code={}",
                    err.category(),
                    err.code()
                );
            })?;

        let page_len = usize::try_from(page_size).unwrap_or(usize::MAX);
        let has_more = match self.mode {
            PaginationMode::ShortPage => !records.is_empty() && records.len() >= page_len,
            PaginationMode::LookAhead => records.len() > page_len,
        };
        records.truncate(page_len);

        let next_cursor = if has_more {
            records.last().map(Cursor::after)
        } else {
            None
        };
        let page = Page {
            records,
            next_cursor,
        };
        debug!(
            "event=page_fetch module=sync status=ok page={page_kind} count={} has_more={}",
            page.records.len(),
            page.has_more()
        );
        Ok(page)
    }
}
