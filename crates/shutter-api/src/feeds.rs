use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use shutter_types::api::Claims;

use crate::auth::AppState;
use crate::error::{db_status, with_db};
use crate::views;

const MAX_PAGE: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination: the id of the oldest post on the previous page.
    pub before: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct RankingQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    30
}

/// GET /timeline: own posts and posts of followed users.
pub async fn timeline(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<TimelineQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let uid = claims.sub;
    let limit = query.limit.min(MAX_PAGE);
    let rows = with_db(&state, move |db| db.get_timeline(uid, limit, query.before))
        .await?
        .map_err(db_status)?;

    Ok(Json(views::posts(rows)))
}

/// GET /favorites: posts the viewer favorited.
pub async fn favorites(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let uid = claims.sub;
    let rows = with_db(&state, move |db| db.get_favorite_posts(uid))
        .await?
        .map_err(db_status)?;

    Ok(Json(views::posts(rows)))
}

/// GET /search?q=: substring search over titles and descriptions.
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let needle = query.q.trim().to_string();
    if needle.is_empty() {
        return Ok(Json(views::posts(Vec::new())));
    }

    let limit = query.limit.min(MAX_PAGE);
    let rows = with_db(&state, move |db| db.search_posts(&needle, limit))
        .await?
        .map_err(db_status)?;

    Ok(Json(views::posts(rows)))
}

/// GET /ranking: most favorited posts.
pub async fn ranking(
    State(state): State<AppState>,
    Query(query): Query<RankingQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let limit = query.limit.min(MAX_PAGE);
    let rows = with_db(&state, move |db| db.get_ranking(limit))
        .await?
        .map_err(db_status)?;

    Ok(Json(views::posts(rows)))
}
