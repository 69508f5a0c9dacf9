//! SQLite storage behind the reference task collection.
//!
//! # Responsibility
//! - Open and configure connections backing `SqliteTaskCollection`.
//! - Bring the task schema up to date before any row is touched.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - A failed migration leaves the previous version in place.

use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    /// Connection or statement failure outside schema upgrades.
    Sqlite(rusqlite::Error),
    /// Migration `version` failed and was rolled back.
    Migration {
        version: u32,
        source: rusqlite::Error,
    },
    /// The file carries a schema written by a newer build.
    SchemaTooNew { found: u32, supported: u32 },
}

impl DbError {
    /// Remote-style error code reported when this surfaces as a `StoreError`.
    pub fn store_code(&self) -> &'static str {
        match self {
            Self::Sqlite(err) if is_contended(err) => "unavailable",
            Self::Sqlite(_) => "internal",
            Self::Migration { .. } => "schema-migration-failed",
            Self::SchemaTooNew { .. } => "failed-precondition",
        }
    }
}

fn is_contended(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "task database error: {err}"),
            Self::Migration { version, source } => {
                write!(f, "task schema migration {version} failed: {source}")
            }
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "task database schema {found} is newer than this build ({supported})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Migration { source: err, .. } => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
