use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{error, info, warn};

use shutter_db::models::NewPost;
use shutter_types::api::{Claims, CommentRequest, PostDetailResponse};
use shutter_types::models::Comment;

use crate::auth::AppState;
use crate::error::{db_status, referenced_status, with_db};
use crate::storage::ImageFormat;
use crate::views;

const MAX_TITLE_LEN: usize = 255;
const MAX_POST_DESCRIPTION_LEN: usize = 2000;
const MAX_COMMENT_LEN: usize = 1000;

/// POST /posts: multipart form with `file`, `title` and `description`.
/// Stores the image, then records the post and its follower fan-out.
pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, StatusCode> {
    let mut file: Option<Bytes> = None;
    let mut title = String::new();
    let mut description = String::new();

    // Oversized bodies surface here as 413
    while let Some(field) = multipart.next_field().await.map_err(|e| e.status())? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => file = Some(field.bytes().await.map_err(|e| e.status())?),
            Some("title") => title = field.text().await.map_err(|e| e.status())?,
            Some("description") => description = field.text().await.map_err(|e| e.status())?,
            _ => {}
        }
    }

    let file = file.filter(|f| !f.is_empty()).ok_or(StatusCode::BAD_REQUEST)?;
    let title = title.trim().to_string();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }
    if description.chars().count() > MAX_POST_DESCRIPTION_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }
    let format = ImageFormat::sniff(&file).ok_or(StatusCode::UNSUPPORTED_MEDIA_TYPE)?;

    let stored = state.storage.save(format, &file).await.map_err(|e| {
        error!("Failed to store image: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let owner = claims.sub;
    let path = stored.clone();
    let result = with_db(&state, move |db| {
        db.record_upload(
            owner,
            &NewPost {
                title: &title,
                description: &description,
                path: &path,
            },
            Utc,
        )
    })
    .await
    .and_then(|r| r.map_err(db_status));

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(status) => {
            // No row points at the file, drop it
            if let Err(e) = state.storage.delete(&stored).await {
                warn!("Failed to remove orphaned image {}: {}", stored, e);
            }
            return Err(status);
        }
    };

    info!(
        "{} uploaded post {} ({} followers notified)",
        claims.username, outcome.post_id, outcome.notified
    );

    let post_id = outcome.post_id;
    let post = with_db(&state, move |db| db.get_post(post_id))
        .await?
        .map_err(db_status)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok((StatusCode::CREATED, Json(views::post(post))))
}

/// GET /posts/{post_id}: post with its comments.
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    viewer: Option<Extension<Claims>>,
) -> Result<impl IntoResponse, StatusCode> {
    let viewer = viewer.map(|Extension(claims)| claims.sub);

    let (post, comments, favorited_by_viewer) = with_db(&state, move |db| {
        let post = db.get_post(post_id)?;
        let comments = db.get_comments(post_id)?;
        let favorited = match viewer {
            Some(v) => Some(db.viewer_favorited(v, post_id)?),
            None => None,
        };
        Ok((post, comments, favorited))
    })
    .await?
    .map_err(db_status)?;

    let post = post.ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(PostDetailResponse {
        post: views::post(post),
        comments: comments.into_iter().map(views::comment).collect(),
        favorited_by_viewer,
    }))
}

/// GET /posts/{post_id}/image: raw image bytes.
pub async fn get_image(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    let post = with_db(&state, move |db| db.get_post(post_id))
        .await?
        .map_err(db_status)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let format = ImageFormat::from_file_name(&post.path).ok_or_else(|| {
        warn!("Post {} has unrecognised image path '{}'", post.id, post.path);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let bytes = state.storage.read(&post.path).await.map_err(|e| {
        error!("Failed to read image {}: {}", post.path, e);
        StatusCode::NOT_FOUND
    })?;

    Ok(([(header::CONTENT_TYPE, format.content_type())], bytes))
}

/// DELETE /posts/{post_id}: owner only. Events about the post go with it.
pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let owner = claims.sub;
    let path = with_db(&state, move |db| db.delete_post(post_id, owner))
        .await?
        .map_err(db_status)?;

    if let Err(e) = state.storage.delete(&path).await {
        warn!("Post {} deleted but image {} remains: {}", post_id, path, e);
    }

    info!("{} deleted post {}", claims.username, post_id);

    Ok(Json(serde_json::json!({ "deleted": post_id })))
}

/// POST /posts/{post_id}/comments: notifies the post owner.
pub async fn comment(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let content = req.content.trim().to_string();
    if content.is_empty() || content.chars().count() > MAX_COMMENT_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    let commenter = claims.sub;
    let body = content.clone();
    let (comment_id, created_at) =
        with_db(&state, move |db| db.record_comment(post_id, commenter, &body, Utc))
            .await?
            .map_err(referenced_status)?;

    Ok((
        StatusCode::CREATED,
        Json(Comment {
            id: comment_id,
            post_id,
            user_id: claims.sub,
            username: claims.username,
            content,
            created_at,
        }),
    ))
}

/// POST /posts/{post_id}/favorite: notifies the post owner.
pub async fn favorite(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let uid = claims.sub;
    with_db(&state, move |db| db.record_favorite(post_id, uid, Utc))
        .await?
        .map_err(referenced_status)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "post_id": post_id, "favorited": true })),
    ))
}

/// DELETE /posts/{post_id}/favorite
pub async fn unfavorite(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let uid = claims.sub;
    with_db(&state, move |db| db.record_unfavorite(post_id, uid))
        .await?
        .map_err(db_status)?;

    Ok(Json(serde_json::json!({ "post_id": post_id, "favorited": false })))
}
