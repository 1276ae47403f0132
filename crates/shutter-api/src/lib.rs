pub mod auth;
pub mod error;
pub mod events;
pub mod feeds;
pub mod middleware;
pub mod posts;
pub mod storage;
pub mod users;
pub mod views;


use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::auth::AppState;
use crate::middleware::{optional_auth, require_auth};

/// Builds every route of the service around `state`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health));

    // Readable anonymously; a valid token adds viewer annotations
    let browse_routes = Router::new()
        .route("/users/{username}", get(users::profile))
        .route("/users/{username}/followers", get(users::followers))
        .route("/users/{username}/following", get(users::following))
        .route("/posts/{post_id}", get(posts::get_post))
        .route("/posts/{post_id}/image", get(posts::get_image))
        .route("/search", get(feeds::search))
        .route("/ranking", get(feeds::ranking))
        .layer(from_fn_with_state(state.clone(), optional_auth));

    let protected_routes = Router::new()
        .route("/me", get(users::me).put(users::update_me))
        .route("/follow", post(users::follow))
        .route("/unfollow", post(users::unfollow))
        .route(
            "/posts",
            post(posts::upload).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .route("/posts/{post_id}", delete(posts::delete_post))
        .route("/posts/{post_id}/comments", post(posts::comment))
        .route(
            "/posts/{post_id}/favorite",
            post(posts::favorite).delete(posts::unfavorite),
        )
        .route("/favorites", get(feeds::favorites))
        .route("/timeline", get(feeds::timeline))
        .route("/events", get(events::list_events))
        .route("/events/unread", get(events::unread_count))
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(browse_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
