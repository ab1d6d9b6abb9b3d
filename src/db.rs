//! SQLite plumbing shared by the user and product stores.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{ffi, Connection};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

pub type SharedConnection = Arc<Mutex<Connection>>;

/// Errors surfaced by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    DuplicateKey,
    #[error("record not found")]
    NotFound,
    #[error("value out of range")]
    OutOfRange,
    #[error("stored row is corrupt: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Backend(#[from] rusqlite::Error),
}

impl StoreError {
    /// Map a rusqlite error, turning UNIQUE and PRIMARY KEY violations into
    /// `DuplicateKey`. Other constraint failures stay backend errors.
    pub fn from_write(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(
                    e.extended_code,
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                ) =>
            {
                StoreError::DuplicateKey
            }
            _ => StoreError::Backend(err),
        }
    }
}

/// Open a SQLite database with the pragmas every store expects.
pub fn open(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path).with_context(|| format!("open database {db_path}"))?;
    conn.pragma_update(None, "journal_mode", "WAL").ok();
    conn.pragma_update(None, "synchronous", "NORMAL").ok();
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .context("set busy timeout")?;
    Ok(conn)
}

pub fn shared(conn: Connection) -> SharedConnection {
    Arc::new(Mutex::new(conn))
}

/// Timestamps are stored as RFC 3339 text.
pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {raw:?}: {e}")))
}
