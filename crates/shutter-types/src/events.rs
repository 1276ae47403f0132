use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What caused a notification. Stored as lowercase text in the `events` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Someone started following the receiver
    Follow,
    /// A user the receiver follows uploaded a post
    Post,
    /// Someone commented on the receiver's post
    Comment,
    /// Someone favorited the receiver's post
    Favorite,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Post => "post",
            Self::Comment => "comment",
            Self::Favorite => "favorite",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventKind(pub String);

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownEventKind {}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "follow" => Ok(Self::Follow),
            "post" => Ok(Self::Post),
            "comment" => Ok(Self::Comment),
            "favorite" => Ok(Self::Favorite),
            other => Err(UnknownEventKind(other.to_string())),
        }
    }
}

/// The post an event refers to, when it still exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSource {
    pub post_id: i64,
    pub title: String,
    pub image_url: String,
}

/// One entry of a user's notification feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEntry {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub invoker_id: i64,
    pub invoker_username: String,
    pub source: Option<EventSource>,
    pub unread: bool,
    pub created_at: DateTime<Utc>,
}

/// Response of `GET /events`: newest first, flags computed before the
/// read cursor moved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFeedResponse {
    pub events: Vec<EventEntry>,
    pub unread_count: i64,
}
