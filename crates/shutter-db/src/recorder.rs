//! Writes that notify someone. Each operation persists its triggering row and
//! the matching `events` row in one transaction, so a notification can never
//! outlive or precede its cause.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use shutter_types::events::EventKind;
use tracing::debug;

use crate::error::OptionalExt;
use crate::models::{NewPost, UploadOutcome};
use crate::{Clock, Database, DbError, Result, encode_ts};

impl Database {
    /// `follower` starts following `followee`; the followee is notified.
    /// Returns the event id.
    pub fn record_follow(&self, follower: i64, followee: i64, clock: impl Clock) -> Result<i64> {
        if follower == followee {
            return Err(DbError::Rejected("users cannot follow themselves"));
        }

        self.with_tx(|conn| {
            let now = encode_ts(clock.stamp());
            conn.execute(
                "INSERT INTO relations (follower_id, following_id, created_at) VALUES (?1, ?2, ?3)",
                (follower, followee, &now),
            )?;
            let event_id = insert_event(conn, followee, EventKind::Follow, None, follower, &now)?;
            debug!("user {} followed {} (event {})", follower, followee, event_id);
            Ok(event_id)
        })
    }

    /// Removes the relation together with the `follow` event it produced.
    pub fn record_unfollow(&self, follower: i64, followee: i64) -> Result<()> {
        self.with_tx(|conn| {
            let removed = conn.execute(
                "DELETE FROM relations WHERE follower_id = ?1 AND following_id = ?2",
                (follower, followee),
            )?;
            if removed == 0 {
                return Err(DbError::NotFound);
            }

            conn.execute(
                "DELETE FROM events WHERE receiver_id = ?1 AND invoker_id = ?2 AND kind = ?3",
                (followee, follower, EventKind::Follow.as_str()),
            )?;
            debug!("user {} unfollowed {}", follower, followee);
            Ok(())
        })
    }

    /// Inserts the post and fans a `post` event out to every current
    /// follower of `owner`. The fan-out is a single INSERT .. SELECT, still
    /// proportional to the follower count.
    pub fn record_upload(
        &self,
        owner: i64,
        post: &NewPost<'_>,
        clock: impl Clock,
    ) -> Result<UploadOutcome> {
        self.with_tx(|conn| {
            let now = encode_ts(clock.stamp());
            conn.execute(
                "INSERT INTO posts (user_id, title, description, path, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (owner, post.title, post.description, post.path, &now),
            )?;
            let post_id = conn.last_insert_rowid();

            let notified = conn.execute(
                "INSERT INTO events (receiver_id, kind, source_id, invoker_id, created_at)
                 SELECT follower_id, ?1, ?2, ?3, ?4
                 FROM relations
                 WHERE following_id = ?3
                 ORDER BY follower_id",
                (EventKind::Post.as_str(), post_id, owner, &now),
            )?;

            debug!("user {} uploaded post {} ({} followers notified)", owner, post_id, notified);
            Ok(UploadOutcome { post_id, notified })
        })
    }

    /// Adds a comment and notifies the post owner. Returns the comment id
    /// and its timestamp; `NotFound` when the post does not exist.
    pub fn record_comment(
        &self,
        post_id: i64,
        commenter: i64,
        content: &str,
        clock: impl Clock,
    ) -> Result<(i64, DateTime<Utc>)> {
        self.with_tx(|conn| {
            let owner = post_owner(conn, post_id)?.ok_or(DbError::NotFound)?;
            let created_at = clock.stamp();
            let now = encode_ts(created_at);

            conn.execute(
                "INSERT INTO comments (post_id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                (post_id, commenter, content, &now),
            )?;
            let comment_id = conn.last_insert_rowid();

            insert_event(conn, owner, EventKind::Comment, Some(post_id), commenter, &now)?;
            debug!("user {} commented on post {}", commenter, post_id);
            Ok((comment_id, created_at))
        })
    }

    /// Marks the post as a favorite of `user` and notifies the owner.
    /// Returns the event id.
    pub fn record_favorite(&self, post_id: i64, user: i64, clock: impl Clock) -> Result<i64> {
        self.with_tx(|conn| {
            let owner = post_owner(conn, post_id)?.ok_or(DbError::NotFound)?;
            let now = encode_ts(clock.stamp());

            conn.execute(
                "INSERT INTO favorites (user_id, post_id, created_at) VALUES (?1, ?2, ?3)",
                (user, post_id, &now),
            )?;
            let event_id = insert_event(conn, owner, EventKind::Favorite, Some(post_id), user, &now)?;
            debug!("user {} favorited post {} (event {})", user, post_id, event_id);
            Ok(event_id)
        })
    }

    /// Removes the favorite and the `favorite` event it produced.
    pub fn record_unfavorite(&self, post_id: i64, user: i64) -> Result<()> {
        self.with_tx(|conn| {
            let removed = conn.execute(
                "DELETE FROM favorites WHERE user_id = ?1 AND post_id = ?2",
                (user, post_id),
            )?;
            if removed == 0 {
                return Err(DbError::NotFound);
            }

            conn.execute(
                "DELETE FROM events WHERE invoker_id = ?1 AND source_id = ?2 AND kind = ?3",
                (user, post_id, EventKind::Favorite.as_str()),
            )?;
            debug!("user {} unfavorited post {}", user, post_id);
            Ok(())
        })
    }

    /// Deletes a post owned by `owner` along with every event, favorite and
    /// comment that references it. Returns the stored image path so the
    /// caller can remove the file.
    pub fn delete_post(&self, post_id: i64, owner: i64) -> Result<String> {
        self.with_tx(|conn| {
            let (user_id, path): (i64, String) = conn
                .query_row(
                    "SELECT user_id, path FROM posts WHERE id = ?1",
                    [post_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?
                .ok_or(DbError::NotFound)?;

            if user_id != owner {
                return Err(DbError::Forbidden);
            }

            let events = conn.execute("DELETE FROM events WHERE source_id = ?1", [post_id])?;
            conn.execute("DELETE FROM favorites WHERE post_id = ?1", [post_id])?;
            conn.execute("DELETE FROM comments WHERE post_id = ?1", [post_id])?;
            conn.execute("DELETE FROM posts WHERE id = ?1", [post_id])?;

            debug!("user {} deleted post {} ({} events removed)", owner, post_id, events);
            Ok(path)
        })
    }
}

fn post_owner(conn: &Connection, post_id: i64) -> Result<Option<i64>> {
    conn.query_row("SELECT user_id FROM posts WHERE id = ?1", [post_id], |row| row.get(0))
        .optional()
}

fn insert_event(
    conn: &Connection,
    receiver: i64,
    kind: EventKind,
    source: Option<i64>,
    invoker: i64,
    now: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO events (receiver_id, kind, source_id, invoker_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (receiver, kind.as_str(), source, invoker, now),
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{at, register, upload};

    fn event_count(db: &Database, receiver: i64, kind: EventKind) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM events WHERE receiver_id = ?1 AND kind = ?2",
                (receiver, kind.as_str()),
                |r| r.get(0),
            )?)
        })
        .unwrap()
    }

    #[test]
    fn follow_records_one_event_and_unfollow_removes_it() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", at(0));
        let bobby = register(&db, "bobby", at(0));

        db.record_follow(alice, bobby, at(1)).unwrap();
        assert_eq!(event_count(&db, bobby, EventKind::Follow), 1);
        assert_eq!(event_count(&db, alice, EventKind::Follow), 0);

        db.record_unfollow(alice, bobby).unwrap();
        assert_eq!(event_count(&db, bobby, EventKind::Follow), 0);
    }

    #[test]
    fn double_follow_is_duplicate_and_leaves_one_event() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", at(0));
        let bobby = register(&db, "bobby", at(0));

        db.record_follow(alice, bobby, at(1)).unwrap();
        let err = db.record_follow(alice, bobby, at(2)).unwrap_err();
        assert!(matches!(err, DbError::Duplicate));
        assert_eq!(event_count(&db, bobby, EventKind::Follow), 1);
    }

    #[test]
    fn following_missing_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", at(0));

        let err = db.record_follow(alice, 999, at(1)).unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[test]
    fn self_follow_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", at(0));

        let err = db.record_follow(alice, alice, at(1)).unwrap_err();
        assert!(matches!(err, DbError::Rejected(_)));
        assert_eq!(db.follower_count(alice).unwrap(), 0);
    }

    #[test]
    fn unfollow_without_relation_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", at(0));
        let bobby = register(&db, "bobby", at(0));

        assert!(matches!(db.record_unfollow(alice, bobby), Err(DbError::NotFound)));
    }

    #[test]
    fn unfollow_keeps_other_followers_events() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", at(0));
        let bobby = register(&db, "bobby", at(0));
        let carol = register(&db, "carol", at(0));

        db.record_follow(alice, carol, at(1)).unwrap();
        db.record_follow(bobby, carol, at(2)).unwrap();
        db.record_unfollow(alice, carol).unwrap();

        let feed = db.list_events(carol, at(3)).unwrap();
        assert_eq!(feed.events.len(), 1);
        assert_eq!(feed.events[0].invoker_id, bobby);
    }

    #[test]
    fn upload_fans_out_to_followers_only() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", at(0));
        let bobby = register(&db, "bobby", at(0));
        let carol = register(&db, "carol", at(0));
        let dave = register(&db, "dave", at(0));
        db.record_follow(bobby, alice, at(1)).unwrap();
        db.record_follow(carol, alice, at(1)).unwrap();

        let outcome = db
            .record_upload(
                alice,
                &NewPost { title: "hoge", description: "fuga", path: "p.png" },
                at(2),
            )
            .unwrap();
        assert_eq!(outcome.notified, 2);

        for follower in [bobby, carol] {
            let feed = db.list_events(follower, at(3)).unwrap();
            assert_eq!(feed.events.len(), 1);
            let event = &feed.events[0];
            assert_eq!(event.kind, EventKind::Post);
            assert_eq!(event.invoker_id, alice);
            assert_eq!(event.source_id, Some(outcome.post_id));
        }
        assert_eq!(event_count(&db, dave, EventKind::Post), 0);
        assert_eq!(event_count(&db, alice, EventKind::Post), 0);
    }

    #[test]
    fn comment_notifies_post_owner() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", at(0));
        let bobby = register(&db, "bobby", at(0));
        let post = upload(&db, alice, "hoge", at(1));

        db.record_comment(post, bobby, "POYO", at(2)).unwrap();

        let comments = db.get_comments(post).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].content, "POYO");
        assert_eq!(comments[0].username, "bobby");

        let feed = db.list_events(alice, at(3)).unwrap();
        assert_eq!(feed.events[0].kind, EventKind::Comment);
        assert_eq!(feed.events[0].invoker_id, bobby);
        assert_eq!(feed.events[0].source_title.as_deref(), Some("hoge"));
    }

    #[test]
    fn comment_on_missing_post_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let bobby = register(&db, "bobby", at(0));

        let err = db.record_comment(1, bobby, "POYO", at(1)).unwrap_err();
        assert!(matches!(err, DbError::NotFound));
        let comments: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM comments", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(comments, 0);
    }

    #[test]
    fn favorite_missing_post_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", at(0));

        assert!(matches!(db.record_favorite(1, alice, at(1)), Err(DbError::NotFound)));
    }

    #[test]
    fn double_favorite_is_duplicate() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", at(0));
        let bobby = register(&db, "bobby", at(0));
        let post = upload(&db, alice, "hoge", at(1));

        db.record_favorite(post, bobby, at(2)).unwrap();
        assert!(matches!(db.record_favorite(post, bobby, at(3)), Err(DbError::Duplicate)));
        assert_eq!(event_count(&db, alice, EventKind::Favorite), 1);
    }

    #[test]
    fn unfavorite_then_refavorite_produces_fresh_event() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", at(0));
        let bobby = register(&db, "bobby", at(0));
        let post = upload(&db, alice, "hoge", at(1));

        let first = db.record_favorite(post, bobby, at(2)).unwrap();
        db.record_unfavorite(post, bobby).unwrap();
        assert_eq!(db.list_events(alice, at(3)).unwrap().events.len(), 0);

        let second = db.record_favorite(post, bobby, at(4)).unwrap();
        assert_ne!(first, second);

        let feed = db.list_events(alice, at(5)).unwrap();
        assert_eq!(feed.events.len(), 1);
        assert_eq!(feed.events[0].id, second);
        assert_eq!(feed.events[0].created_at, at(4));
    }

    #[test]
    fn unfavorite_only_removes_own_event() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", at(0));
        let bobby = register(&db, "bobby", at(0));
        let carol = register(&db, "carol", at(0));
        let post = upload(&db, alice, "hoge", at(1));

        db.record_favorite(post, bobby, at(2)).unwrap();
        db.record_favorite(post, carol, at(3)).unwrap();
        db.record_unfavorite(post, bobby).unwrap();

        let feed = db.list_events(alice, at(4)).unwrap();
        assert_eq!(feed.events.len(), 1);
        assert_eq!(feed.events[0].invoker_id, carol);
        assert!(matches!(db.record_unfavorite(post, bobby), Err(DbError::NotFound)));
    }

    #[test]
    fn delete_post_cascades_to_events() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", at(0));
        let bobby = register(&db, "bobby", at(0));
        db.record_follow(bobby, alice, at(1)).unwrap();
        let post = upload(&db, alice, "hoge", at(2));
        db.record_favorite(post, bobby, at(3)).unwrap();
        db.record_comment(post, bobby, "POYO", at(4)).unwrap();

        let path = db.delete_post(post, alice).unwrap();
        assert_eq!(path, "hoge.png");

        assert!(db.get_post(post).unwrap().is_none());
        assert_eq!(event_count(&db, bobby, EventKind::Post), 0);
        assert_eq!(event_count(&db, alice, EventKind::Favorite), 0);
        assert_eq!(event_count(&db, alice, EventKind::Comment), 0);
        // The follow event has no source post and survives
        assert_eq!(event_count(&db, alice, EventKind::Follow), 1);
        assert!(db.get_favorite_posts(bobby).unwrap().is_empty());
    }

    #[test]
    fn only_owner_can_delete_post() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", at(0));
        let bobby = register(&db, "bobby", at(0));
        let post = upload(&db, alice, "hoge", at(1));

        assert!(matches!(db.delete_post(post, bobby), Err(DbError::Forbidden)));
        assert!(matches!(db.delete_post(post + 1, alice), Err(DbError::NotFound)));
        assert!(db.get_post(post).unwrap().is_some());
    }
}
