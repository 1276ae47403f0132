use chrono::{DateTime, TimeZone, Utc};

use crate::Database;
use crate::models::NewPost;

/// A fixed instant `secs` seconds after the test epoch.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

pub fn register(db: &Database, username: &str, now: DateTime<Utc>) -> i64 {
    db.create_user(username, "not-a-real-hash", "", now).unwrap()
}

pub fn upload(db: &Database, owner: i64, title: &str, now: DateTime<Utc>) -> i64 {
    db.record_upload(
        owner,
        &NewPost {
            title,
            description: "",
            path: &format!("{title}.png"),
        },
        now,
    )
    .unwrap()
    .post_id
}
