pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod reader;
pub mod recorder;
pub mod viewer;

#[cfg(test)]
mod test_util;

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Row, types::Type};
use tracing::info;

pub use error::{DbError, Result};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        let db = Self::init(conn)?;
        info!("Database opened at {} (journal_mode={})", path.display(), mode);
        Ok(db)
    }

    /// Fresh private database, used by tests and throwaway instances.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        f(&conn)
    }

    /// Run `f` inside a transaction. Commits when `f` returns `Ok`; any error
    /// drops the transaction, which rolls every write back.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

/// Where a write gets its timestamp. Methods taking a `Clock` read it only
/// after the connection lock is held, so stamps follow commit order and a
/// feed view can never move the cursor past an event that commits later.
pub trait Clock {
    fn stamp(&self) -> DateTime<Utc>;
}

/// The system clock.
impl Clock for Utc {
    fn stamp(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A fixed instant.
impl Clock for DateTime<Utc> {
    fn stamp(&self) -> DateTime<Utc> {
        *self
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn stamp(&self) -> DateTime<Utc> {
        (**self).stamp()
    }
}

/// Timestamps are stored as fixed-width RFC 3339 text with nanoseconds and a
/// `Z` suffix, so SQL string comparison agrees with chronological order.
pub(crate) fn encode_ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
