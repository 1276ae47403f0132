use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use shutter_types::api::{Claims, UnreadCountResponse};
use shutter_types::events::EventFeedResponse;

use crate::auth::AppState;
use crate::error::{db_status, with_db};
use crate::views;

/// GET /events: the viewer's notifications, newest first. Viewing marks the
/// whole feed read, so the flags returned here are the last unread ones.
pub async fn list_events(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let uid = claims.sub;
    let feed = with_db(&state, move |db| db.list_events(uid, Utc))
        .await?
        .map_err(|e| match e {
            // No cursor: the token outlived its user
            shutter_db::DbError::NotFound => StatusCode::UNAUTHORIZED,
            e => db_status(e),
        })?;

    Ok(Json(EventFeedResponse {
        events: feed.events.into_iter().map(views::event).collect(),
        unread_count: feed.unread_count,
    }))
}

/// GET /events/unread: badge count, leaves the feed unread.
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let uid = claims.sub;
    let unread_count = with_db(&state, move |db| db.unread_count(uid))
        .await?
        .map_err(db_status)?;

    Ok(Json(UnreadCountResponse { unread_count }))
}
