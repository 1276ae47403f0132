use serde::{Deserialize, Serialize};

use crate::models::{Comment, Post, User};

// -- JWT Claims --

/// JWT claims issued at register/login and checked by the auth middleware.
/// `sub` is the user id; handlers pass it to the database explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub token: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: User,
    pub unread_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: User,
    pub posts: Vec<Post>,
    pub follower_count: i64,
    pub following_count: i64,
    /// `None` when the request is anonymous or the viewer is this user.
    pub followed_by_viewer: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FollowRequest {
    pub username: String,
}

// -- Posts --

#[derive(Debug, Serialize, Deserialize)]
pub struct PostDetailResponse {
    pub post: Post,
    pub comments: Vec<Comment>,
    /// `None` when the request is anonymous.
    pub favorited_by_viewer: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub content: String,
}

// -- Events --

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}
