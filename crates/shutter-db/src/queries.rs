use rusqlite::{Connection, Row};

use crate::error::OptionalExt;
use crate::models::{CommentRow, PostRow, UserRow};
use crate::{Clock, Database, Result, encode_ts, get_ts};

const USER_COLUMNS: &str = "id, username, password, description, created_at, updated_at";

const POST_SELECT: &str = "SELECT p.id, p.user_id, u.username, p.title, p.description, p.path,
            (SELECT COUNT(*) FROM favorites f WHERE f.post_id = p.id) AS favorite_count,
            p.created_at
     FROM posts p
     JOIN users u ON u.id = p.user_id";

impl Database {
    // -- Users --

    /// Inserts the user and their read cursor in one transaction. The cursor
    /// starts at the registration instant, so a new account has nothing unread.
    pub fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        description: &str,
        clock: impl Clock,
    ) -> Result<i64> {
        self.with_tx(|conn| {
            let now = encode_ts(clock.stamp());
            conn.execute(
                "INSERT INTO users (username, password, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                (username, password_hash, description, &now),
            )?;
            let user_id = conn.last_insert_rowid();

            conn.execute(
                "INSERT INTO event_have_reads (user_id, since) VALUES (?1, ?2)",
                (user_id, &now),
            )?;

            Ok(user_id)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                [username],
                map_user,
            )
            .optional()
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id],
                map_user,
            )
            .optional()
        })
    }

    /// Returns the updated row, or `NotFound` if the user vanished.
    pub fn update_description(
        &self,
        user_id: i64,
        description: &str,
        clock: impl Clock,
    ) -> Result<UserRow> {
        self.with_tx(|conn| {
            conn.execute(
                "UPDATE users SET description = ?1, updated_at = ?2 WHERE id = ?3",
                (description, encode_ts(clock.stamp()), user_id),
            )?;
            Ok(conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [user_id],
                map_user,
            )?)
        })
    }

    pub fn follower_count(&self, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM relations WHERE following_id = ?1",
                [user_id],
                |r| r.get(0),
            )?)
        })
    }

    pub fn following_count(&self, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM relations WHERE follower_id = ?1",
                [user_id],
                |r| r.get(0),
            )?)
        })
    }

    /// Users following `user_id`, most recent follow first.
    pub fn get_followers(&self, user_id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.password, u.description, u.created_at, u.updated_at
                 FROM relations r
                 JOIN users u ON u.id = r.follower_id
                 WHERE r.following_id = ?1
                 ORDER BY r.created_at DESC, u.id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Users that `user_id` follows, most recent follow first.
    pub fn get_following(&self, user_id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.password, u.description, u.created_at, u.updated_at
                 FROM relations r
                 JOIN users u ON u.id = r.following_id
                 WHERE r.follower_id = ?1
                 ORDER BY r.created_at DESC, u.id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Posts --

    pub fn get_post(&self, post_id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{POST_SELECT} WHERE p.id = ?1"), [post_id], map_post)
                .optional()
        })
    }

    pub fn get_posts_by_user(&self, user_id: i64) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            query_posts(
                conn,
                &format!("{POST_SELECT} WHERE p.user_id = ?1 ORDER BY p.id DESC"),
                rusqlite::params![user_id],
            )
        })
    }

    /// Posts by the viewer and everyone they follow, newest first. `before`
    /// is the id of the oldest post on the previous page.
    pub fn get_timeline(
        &self,
        viewer_id: i64,
        limit: u32,
        before: Option<i64>,
    ) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            query_posts(
                conn,
                &format!(
                    "{POST_SELECT}
                     WHERE (p.user_id = ?1
                            OR p.user_id IN (SELECT following_id FROM relations WHERE follower_id = ?1))
                       AND (?2 IS NULL OR p.id < ?2)
                     ORDER BY p.id DESC
                     LIMIT ?3"
                ),
                rusqlite::params![viewer_id, before, limit],
            )
        })
    }

    /// Posts the user has favorited, most recently favorited first.
    pub fn get_favorite_posts(&self, user_id: i64) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            query_posts(
                conn,
                &format!(
                    "{POST_SELECT}
                     JOIN favorites fav ON fav.post_id = p.id
                     WHERE fav.user_id = ?1
                     ORDER BY fav.created_at DESC, fav.rowid DESC"
                ),
                rusqlite::params![user_id],
            )
        })
    }

    /// Substring match on title or description. `%`, `_` and `\` in the
    /// query are matched literally.
    pub fn search_posts(&self, query: &str, limit: u32) -> Result<Vec<PostRow>> {
        let pattern = format!("%{}%", escape_like(query));
        self.with_conn(|conn| {
            query_posts(
                conn,
                &format!(
                    "{POST_SELECT}
                     WHERE p.title LIKE ?1 ESCAPE '\\' OR p.description LIKE ?1 ESCAPE '\\'
                     ORDER BY p.id DESC
                     LIMIT ?2"
                ),
                rusqlite::params![pattern, limit],
            )
        })
    }

    /// Most favorited posts; ties go to the newer post.
    pub fn get_ranking(&self, limit: u32) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            query_posts(
                conn,
                &format!(
                    "{POST_SELECT}
                     ORDER BY favorite_count DESC, p.id DESC
                     LIMIT ?1"
                ),
                rusqlite::params![limit],
            )
        })
    }

    // -- Comments --

    /// Comments on a post, oldest first.
    pub fn get_comments(&self, post_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.post_id, c.user_id, u.username, c.content, c.created_at
                 FROM comments c
                 JOIN users u ON u.id = c.user_id
                 WHERE c.post_id = ?1
                 ORDER BY c.id ASC",
            )?;
            let rows = stmt
                .query_map([post_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        user_id: row.get(2)?,
                        username: row.get(3)?,
                        content: row.get(4)?,
                        created_at: get_ts(row, 5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        description: row.get(3)?,
        created_at: get_ts(row, 4)?,
        updated_at: get_ts(row, 5)?,
    })
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        path: row.get(5)?,
        favorite_count: row.get(6)?,
        created_at: get_ts(row, 7)?,
    })
}

fn query_posts(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<PostRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_post)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
