//! SQLite-backed task collection with an in-process change feed.
//!
//! # Responsibility
//! - Serve ordered, cursor-continued pages over the `tasks` table.
//! - Broadcast `added/modified/removed` changes to registered sinks.
//!
//! # Invariants
//! - Order is `created_at DESC, id ASC` for pages and snapshots alike.
//! - A new subscription first receives an `added` change per existing row.
//! - Writes and broadcasts happen under the connection lock, so every sink
//!   observes changes for one id in commit order.

use crate::db::{open_db_in_memory, DbError, DbResult};
use crate::model::task::{NewTask, TaskId, TaskPatch, TaskRecord};
use crate::remote::{
    ChangeSink, PageQuery, RemoteChange, StoreError, StoreResult, SubscriptionHandle,
    TaskCollection,
};
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    completed,
    owner_id,
    created_at
FROM tasks";

const TASK_ORDER_SQL: &str = "ORDER BY created_at DESC, id ASC";

type SinkMap = BTreeMap<u64, Arc<dyn ChangeSink>>;

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        StoreError::from_code(value.store_code(), value.to_string())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        DbError::Sqlite(value).into()
    }
}

/// Task collection over one SQLite connection.
pub struct SqliteTaskCollection {
    conn: Mutex<Connection>,
    sinks: Arc<Mutex<SinkMap>>,
    next_subscription_id: AtomicU64,
}

impl SqliteTaskCollection {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            sinks: Arc::new(Mutex::new(BTreeMap::new())),
            next_subscription_id: AtomicU64::new(1),
        }
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Number of currently registered change sinks.
    pub fn subscriber_count(&self) -> usize {
        self.sinks.lock().len()
    }

    pub fn get(&self, id: &str) -> StoreResult<Option<TaskRecord>> {
        let conn = self.conn.lock();
        fetch_task(&conn, id)
    }

    /// Inserts a fully formed record, keeping its id. Used for seeding/import.
    pub fn insert_record(&self, record: &TaskRecord) -> StoreResult<()> {
        let conn = self.conn.lock();
        insert_task(&conn, record)?;
        self.broadcast(RemoteChange::added(record.clone()));
        Ok(())
    }

    /// Delivers `change` to every live sink, dropping sinks that stopped
    /// accepting events. Callers hold the connection lock.
    fn broadcast(&self, change: RemoteChange) {
        let mut sinks = self.sinks.lock();
        sinks.retain(|subscription_id, sink| {
            let accepted = sink.on_change(change.clone());
            if !accepted {
                debug!(
                    "event=feed_sink_closed module=repo status=ok subscription_id={subscription_id}"
                );
            }
            accepted
        });
    }
}

impl TaskCollection for SqliteTaskCollection {
    fn query(&self, query: &PageQuery) -> StoreResult<Vec<TaskRecord>> {
        let conn = self.conn.lock();
        let limit = i64::from(query.limit);

        let mut tasks = Vec::new();
        match &query.start_after {
            None => {
                let mut stmt =
                    conn.prepare(&format!("{TASK_SELECT_SQL} {TASK_ORDER_SQL} LIMIT ?1;"))?;
                let mut rows = stmt.query(params![limit])?;
                while let Some(row) = rows.next()? {
                    tasks.push(parse_task_row(row)?);
                }
            }
            Some(cursor) => {
                let mut stmt = conn.prepare(&format!(
                    "{TASK_SELECT_SQL}
                     WHERE created_at < ?1 OR (created_at = ?1 AND id > ?2)
                     {TASK_ORDER_SQL}
                     LIMIT ?3;"
                ))?;
                let mut rows = stmt.query(params![cursor.created_at(), cursor.task_id(), limit])?;
                while let Some(row) = rows.next()? {
                    tasks.push(parse_task_row(row)?);
                }
            }
        }

        Ok(tasks)
    }

    fn subscribe(&self, sink: Arc<dyn ChangeSink>) -> StoreResult<SubscriptionHandle> {
        let conn = self.conn.lock();
        let snapshot = list_all(&conn)?;

        let subscription_id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        self.sinks.lock().insert(subscription_id, Arc::clone(&sink));

        for record in snapshot {
            if !sink.on_change(RemoteChange::added(record)) {
                break;
            }
        }
        info!("event=feed_subscribe module=repo status=ok subscription_id={subscription_id}");

        let sinks = Arc::clone(&self.sinks);
        Ok(SubscriptionHandle::new(subscription_id, move || {
            if sinks.lock().remove(&subscription_id).is_some() {
                info!(
                    "event=feed_unsubscribe module=repo status=ok subscription_id={subscription_id}"
                );
            }
        }))
    }

    fn create(&self, draft: &NewTask) -> StoreResult<TaskId> {
        draft
            .validate()
            .map_err(|err| StoreError::from_code("invalid-argument", err.to_string()))?;

        let record = TaskRecord::from_draft(Uuid::new_v4().to_string(), draft);
        let conn = self.conn.lock();
        insert_task(&conn, &record)?;
        self.broadcast(RemoteChange::added(record.clone()));
        Ok(record.id)
    }

    fn update(&self, id: &str, patch: &TaskPatch) -> StoreResult<()> {
        patch
            .validate()
            .map_err(|err| StoreError::from_code("invalid-argument", err.to_string()))?;

        let mut assignments = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(title) = &patch.title {
            assignments.push("title = ?");
            bind_values.push(Value::Text(title.clone()));
        }
        if let Some(description) = &patch.description {
            assignments.push("description = ?");
            bind_values.push(Value::Text(description.clone()));
        }
        if let Some(completed) = patch.completed {
            assignments.push("completed = ?");
            bind_values.push(Value::Integer(bool_to_int(completed)));
        }
        bind_values.push(Value::Text(id.to_string()));

        let conn = self.conn.lock();
        let changed = conn.execute(
            &format!("UPDATE tasks SET {} WHERE id = ?;", assignments.join(", ")),
            params_from_iter(bind_values),
        )?;
        if changed == 0 {
            return Err(StoreError::not_found(format!("task not found: {id}")));
        }

        let record = fetch_task(&conn, id)?
            .ok_or_else(|| StoreError::internal(format!("updated task vanished: {id}")))?;
        self.broadcast(RemoteChange::modified(record));
        Ok(())
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        let conn = self.conn.lock();
        let Some(record) = fetch_task(&conn, id)? else {
            return Err(StoreError::not_found(format!("task not found: {id}")));
        };

        conn.execute("DELETE FROM tasks WHERE id = ?1;", [id])?;
        self.broadcast(RemoteChange::removed(record));
        Ok(())
    }
}

fn insert_task(conn: &Connection, record: &TaskRecord) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO tasks (
            id,
            title,
            description,
            completed,
            owner_id,
            created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            record.id.as_str(),
            record.title.as_str(),
            record.description.as_str(),
            bool_to_int(record.completed),
            record.owner_id.as_str(),
            record.created_at,
        ],
    )?;
    Ok(())
}

fn fetch_task(conn: &Connection, id: &str) -> StoreResult<Option<TaskRecord>> {
    let mut stmt = conn.prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
    let row = stmt
        .query_row([id], |row| Ok(parse_task_row(row)))
        .optional()?;
    row.transpose()
}

fn list_all(conn: &Connection) -> StoreResult<Vec<TaskRecord>> {
    let mut stmt = conn.prepare(&format!("{TASK_SELECT_SQL} {TASK_ORDER_SQL};"))?;
    let mut rows = stmt.query([])?;
    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(parse_task_row(row)?);
    }
    Ok(tasks)
}

fn parse_task_row(row: &Row<'_>) -> StoreResult<TaskRecord> {
    let completed = match row.get::<_, i64>("completed")? {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::internal(format!(
                "invalid completed value `{other}` in tasks.completed"
            )));
        }
    };

    Ok(TaskRecord {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        completed,
        owner_id: row.get("owner_id")?,
        created_at: row.get("created_at")?,
    })
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
