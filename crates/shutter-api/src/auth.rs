use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};

use shutter_db::{Database, DbError};
use shutter_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::{db_status, with_db};
use crate::storage::Storage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub storage: Storage,
    pub max_upload_bytes: usize,
}

const MIN_USERNAME_LEN: usize = 4;
const MAX_USERNAME_LEN: usize = 31;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_DESCRIPTION_LEN: usize = 1000;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Validate input
    if !valid_username(&req.username) {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }
    if !valid_description(&req.description) {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .to_string();

    // The unique index on username settles races between two registrations
    let username = req.username.clone();
    let description = req.description;
    let user_id = with_db(&state, move |db| {
        db.create_user(&username, &password_hash, &description, Utc)
    })
    .await?
    .map_err(|e| match e {
        DbError::Duplicate => StatusCode::CONFLICT,
        e => db_status(e),
    })?;

    let token = create_token(&state.jwt_secret, user_id, &req.username).map_err(|e| {
        error!("Failed to sign token: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    info!("Registered user {} ({})", req.username, user_id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let username = req.username.clone();
    let user = with_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .map_err(db_status)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Verify password
    let parsed_hash =
        PasswordHash::new(&user.password).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let token = create_token(&state.jwt_secret, user.id, &user.username)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        username: user.username,
        token,
    }))
}

/// Usernames are 4 to 31 ASCII letters, digits or underscores.
fn valid_username(name: &str) -> bool {
    (MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&name.len())
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

pub(crate) fn valid_description(description: &str) -> bool {
    description.chars().count() <= MAX_DESCRIPTION_LEN
}

fn create_token(secret: &str, user_id: i64, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(valid_username("alice"));
        assert!(valid_username("bob_2"));
        assert!(valid_username(&"a".repeat(31)));
        assert!(!valid_username("bob"));
        assert!(!valid_username(&"a".repeat(32)));
        assert!(!valid_username("al ice"));
        assert!(!valid_username("@alice"));
    }
}
