//! The notification feed. Read state is never stored per event: each user has
//! one cursor (`event_have_reads.since`) and an event is unread iff it was
//! created strictly after it.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rusqlite::types::Type;
use shutter_types::events::EventKind;
use tracing::debug;

use crate::models::{EventFeed, EventRow};
use crate::{Clock, Database, Result, encode_ts, get_ts};

impl Database {
    /// Returns the viewer's events newest first with their unread flags, and
    /// marks the whole feed read when its newest entry was unread.
    ///
    /// The cursor moves to the clock's reading only in that case, inside the
    /// same transaction as the read: if the update fails, the caller gets the
    /// error and the cursor is left untouched.
    pub fn list_events(&self, viewer: i64, clock: impl Clock) -> Result<EventFeed> {
        self.with_tx(|conn| {
            let since = read_cursor(conn, viewer)?;
            let events = query_events(conn, viewer, since)?;
            let unread_count = events.iter().filter(|e| e.unread).count() as i64;

            if events.first().is_some_and(|e| e.unread) {
                conn.execute(
                    "UPDATE event_have_reads SET since = ?1 WHERE user_id = ?2",
                    (encode_ts(clock.stamp()), viewer),
                )?;
                debug!("user {} read {} events, cursor advanced", viewer, unread_count);
            }

            Ok(EventFeed {
                events,
                unread_count,
            })
        })
    }

    /// Badge count. Never moves the cursor.
    pub fn unread_count(&self, viewer: i64) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*)
                 FROM events e
                 JOIN event_have_reads r ON r.user_id = e.receiver_id
                 WHERE e.receiver_id = ?1 AND e.created_at > r.since",
                [viewer],
                |r| r.get(0),
            )?)
        })
    }
}

/// A missing cursor means the user does not exist.
fn read_cursor(conn: &Connection, user_id: i64) -> Result<DateTime<Utc>> {
    Ok(conn.query_row(
        "SELECT since FROM event_have_reads WHERE user_id = ?1",
        [user_id],
        |row| get_ts(row, 0),
    )?)
}

fn query_events(conn: &Connection, receiver: i64, since: DateTime<Utc>) -> Result<Vec<EventRow>> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.kind, e.source_id, p.title, e.invoker_id, u.username, e.created_at
         FROM events e
         JOIN users u ON u.id = e.invoker_id
         LEFT JOIN posts p ON p.id = e.source_id
         WHERE e.receiver_id = ?1
         ORDER BY e.id DESC",
    )?;

    let rows = stmt
        .query_map([receiver], |row| {
            let raw_kind: String = row.get(1)?;
            let kind = raw_kind.parse::<EventKind>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
            })?;
            let created_at = get_ts(row, 6)?;

            Ok(EventRow {
                id: row.get(0)?,
                kind,
                source_id: row.get(2)?,
                source_title: row.get(3)?,
                invoker_id: row.get(4)?,
                invoker_username: row.get(5)?,
                created_at,
                unread: created_at > since,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
