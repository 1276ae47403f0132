use axum::http::StatusCode;
use tracing::error;

use shutter_db::{Database, DbError};

use crate::auth::AppState;

/// Runs a blocking database call off the async runtime. The outer error is a
/// join failure, already turned into a 500; the inner one is left to the
/// handler so it can pick status codes per operation.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<shutter_db::Result<T>, StatusCode>
where
    F: FnOnce(&Database) -> shutter_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// Default mapping from database failures to HTTP status codes.
pub(crate) fn db_status(err: DbError) -> StatusCode {
    match err {
        DbError::NotFound => StatusCode::NOT_FOUND,
        DbError::Duplicate => StatusCode::CONFLICT,
        DbError::Forbidden => StatusCode::FORBIDDEN,
        DbError::Rejected(_) => StatusCode::BAD_REQUEST,
        e => {
            error!("Database error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// For writes that reference a post by id: a missing post is a bad request,
/// not a missing page.
pub(crate) fn referenced_status(err: DbError) -> StatusCode {
    match err {
        DbError::NotFound => StatusCode::BAD_REQUEST,
        e => db_status(e),
    }
}
