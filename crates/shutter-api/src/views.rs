//! Row-to-response conversions.

use shutter_db::models::{CommentRow, EventRow, PostRow, UserRow};
use shutter_types::events::{EventEntry, EventSource};
use shutter_types::models::{Comment, Post, User};

pub fn image_url(post_id: i64) -> String {
    format!("/posts/{}/image", post_id)
}

pub fn user(row: UserRow) -> User {
    User {
        id: row.id,
        username: row.username,
        description: row.description,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub fn post(row: PostRow) -> Post {
    Post {
        id: row.id,
        user_id: row.user_id,
        username: row.username,
        title: row.title,
        description: row.description,
        image_url: image_url(row.id),
        favorite_count: row.favorite_count,
        created_at: row.created_at,
    }
}

pub fn posts(rows: Vec<PostRow>) -> Vec<Post> {
    rows.into_iter().map(post).collect()
}

pub fn comment(row: CommentRow) -> Comment {
    Comment {
        id: row.id,
        post_id: row.post_id,
        user_id: row.user_id,
        username: row.username,
        content: row.content,
        created_at: row.created_at,
    }
}

pub fn event(row: EventRow) -> EventEntry {
    // The LEFT JOIN yields no title once the post is gone
    let source = match (row.source_id, row.source_title) {
        (Some(post_id), Some(title)) => Some(EventSource {
            post_id,
            title,
            image_url: image_url(post_id),
        }),
        _ => None,
    };

    EventEntry {
        id: row.id,
        kind: row.kind,
        invoker_id: row.invoker_id,
        invoker_username: row.invoker_username,
        source,
        unread: row.unread,
        created_at: row.created_at,
    }
}
