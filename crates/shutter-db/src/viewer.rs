//! Read-only lookups about the logged-in viewer, used by handlers to annotate
//! pages (follow buttons, favorite toggles). Always called with an explicit
//! viewer id.

use crate::{Database, Result};

impl Database {
    pub fn viewer_follows(&self, viewer: i64, target: i64) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM relations WHERE follower_id = ?1 AND following_id = ?2)",
                (viewer, target),
                |r| r.get(0),
            )?)
        })
    }

    pub fn viewer_favorited(&self, viewer: i64, post_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM favorites WHERE user_id = ?1 AND post_id = ?2)",
                (viewer, post_id),
                |r| r.get(0),
            )?)
        })
    }
}
