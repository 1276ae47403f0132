use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;

use shutter_db::{Database, DbError};
use shutter_types::api::{Claims, FollowRequest, MeResponse, ProfileResponse, UpdateProfileRequest};

use crate::auth::{AppState, valid_description};
use crate::error::{db_status, with_db};
use crate::views;

/// GET /me: the logged-in user with their unread badge.
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let uid = claims.sub;
    let (user, unread_count) = with_db(&state, move |db| {
        let user = db.get_user_by_id(uid)?;
        let unread = db.unread_count(uid)?;
        Ok((user, unread))
    })
    .await?
    .map_err(db_status)?;

    // A valid token for a user that no longer exists
    let user = user.ok_or(StatusCode::UNAUTHORIZED)?;

    Ok(Json(MeResponse {
        user: views::user(user),
        unread_count,
    }))
}

/// PUT /me: profile settings.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if !valid_description(&req.description) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let uid = claims.sub;
    let row = with_db(&state, move |db| db.update_description(uid, &req.description, Utc))
        .await?
        .map_err(|e| match e {
            DbError::NotFound => StatusCode::UNAUTHORIZED,
            e => db_status(e),
        })?;

    Ok(Json(views::user(row)))
}

/// GET /users/{username}
pub async fn profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    viewer: Option<Extension<Claims>>,
) -> Result<impl IntoResponse, StatusCode> {
    let viewer = viewer.map(|Extension(claims)| claims.sub);

    let response = with_db(&state, move |db| {
        let user = db.get_user_by_username(&username)?.ok_or(DbError::NotFound)?;
        let posts = db.get_posts_by_user(user.id)?;
        let follower_count = db.follower_count(user.id)?;
        let following_count = db.following_count(user.id)?;
        let followed_by_viewer = match viewer {
            Some(v) if v != user.id => Some(db.viewer_follows(v, user.id)?),
            _ => None,
        };

        Ok(ProfileResponse {
            user: views::user(user),
            posts: views::posts(posts),
            follower_count,
            following_count,
            followed_by_viewer,
        })
    })
    .await?
    .map_err(db_status)?;

    Ok(Json(response))
}

/// GET /users/{username}/followers
pub async fn followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let rows = with_db(&state, move |db| {
        let user = lookup(db, &username)?;
        db.get_followers(user)
    })
    .await?
    .map_err(db_status)?;

    Ok(Json(rows.into_iter().map(views::user).collect::<Vec<_>>()))
}

/// GET /users/{username}/following
pub async fn following(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let rows = with_db(&state, move |db| {
        let user = lookup(db, &username)?;
        db.get_following(user)
    })
    .await?
    .map_err(db_status)?;

    Ok(Json(rows.into_iter().map(views::user).collect::<Vec<_>>()))
}

/// POST /follow: notifies the followed user.
pub async fn follow(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FollowRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let follower = claims.sub;
    let username = req.username.clone();
    with_db(&state, move |db| {
        let target = lookup(db, &username)?;
        db.record_follow(follower, target, Utc)
    })
    .await?
    .map_err(db_status)?;

    info!("{} followed {}", claims.username, req.username);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "following": req.username })),
    ))
}

/// POST /unfollow
pub async fn unfollow(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FollowRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let follower = claims.sub;
    let username = req.username.clone();
    with_db(&state, move |db| {
        let target = lookup(db, &username)?;
        db.record_unfollow(follower, target)
    })
    .await?
    .map_err(db_status)?;

    info!("{} unfollowed {}", claims.username, req.username);

    Ok(Json(serde_json::json!({ "unfollowed": req.username })))
}

fn lookup(db: &Database, username: &str) -> shutter_db::Result<i64> {
    db.get_user_by_username(username)?
        .map(|u| u.id)
        .ok_or(DbError::NotFound)
}
