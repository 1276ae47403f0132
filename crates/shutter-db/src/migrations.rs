use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, relations, posts)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE relations (
                follower_id     INTEGER NOT NULL REFERENCES users(id),
                following_id    INTEGER NOT NULL REFERENCES users(id),
                created_at      TEXT NOT NULL,
                PRIMARY KEY (follower_id, following_id)
            );

            CREATE INDEX idx_relations_following
                ON relations(following_id);

            CREATE TABLE posts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                title       TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                path        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_posts_user
                ON posts(user_id, id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (favorites, comments)");
        conn.execute_batch(
            "
            CREATE TABLE favorites (
                user_id     INTEGER NOT NULL REFERENCES users(id),
                post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (user_id, post_id)
            );

            CREATE INDEX idx_favorites_post
                ON favorites(post_id);

            CREATE TABLE comments (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_comments_post
                ON comments(post_id, id);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    if version < 3 {
        info!("Running migration v3 (events, read cursors)");
        conn.execute_batch(
            "
            CREATE TABLE events (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                receiver_id INTEGER NOT NULL REFERENCES users(id),
                kind        TEXT NOT NULL
                            CHECK (kind IN ('follow', 'post', 'comment', 'favorite')),
                source_id   INTEGER REFERENCES posts(id) ON DELETE CASCADE,
                invoker_id  INTEGER NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_events_receiver
                ON events(receiver_id, id);

            CREATE INDEX idx_events_source
                ON events(source_id);

            -- One row per user: events created after `since` are unread
            CREATE TABLE event_have_reads (
                user_id     INTEGER PRIMARY KEY REFERENCES users(id),
                since       TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (3);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
