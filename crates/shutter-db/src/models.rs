//! Database row types. These map directly to SQLite rows and stay
//! independent of the shutter-types API models.

use chrono::{DateTime, Utc};
use shutter_types::events::EventKind;

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A post joined with its author's username and favorite count.
pub struct PostRow {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub title: String,
    pub description: String,
    pub path: String,
    pub favorite_count: i64,
    pub created_at: DateTime<Utc>,
}

pub struct NewPost<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub path: &'a str,
}

pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// An event joined with its invoker and, for post-backed kinds, the post.
pub struct EventRow {
    pub id: i64,
    pub kind: EventKind,
    pub source_id: Option<i64>,
    pub source_title: Option<String>,
    pub invoker_id: i64,
    pub invoker_username: String,
    pub created_at: DateTime<Utc>,
    pub unread: bool,
}

pub struct EventFeed {
    pub events: Vec<EventRow>,
    pub unread_count: i64,
}

pub struct UploadOutcome {
    pub post_id: i64,
    /// Number of followers that received a `post` event.
    pub notified: usize,
}
