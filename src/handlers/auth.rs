//! Authentication handlers: register, login, logout, current user.
//!
//! Passwords are hashed with Argon2; session tokens are 32 random bytes
//! whose SHA-256 hash is stored in the sessions table. The first registered
//! user becomes the admin.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};

use crate::{
    AppState,
    error::AppError,
    middleware::auth::{SessionContext, hash_secret},
    models::user::{LoginRequest, LoginResponse, RegisterRequest, Role, User, UserResponse},
    services::ingestion,
};

/// Hash a password with Argon2 and a fresh salt.
fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AppError::InvalidRequest("could not hash password".to_string()))
}

/// Verify a password against a stored Argon2 hash.
fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Generate a session token: 32 random bytes as hex.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Password strength rule: at least 8 characters with a letter and a digit.
/// Returns the failure message, or `None` when the password is acceptable.
fn password_weakness(password: &str) -> Option<&'static str> {
    if password.len() < 8 {
        return Some("password must be at least 8 characters");
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Some("password must contain at least one letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Some("password must contain at least one digit");
    }
    None
}

/// `POST /api/v1/auth/register`
///
/// Creates a user and returns 201 with the user (no session; clients log in
/// separately). The first user ever registered gets the admin role.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let name = request.name.trim();
    let email = request.email.trim().to_lowercase();
    if name.is_empty() {
        return Err(AppError::InvalidRequest("name is required".to_string()));
    }
    if !ingestion::is_valid_email(&email) {
        return Err(AppError::InvalidRequest(
            "email is not a valid address".to_string(),
        ));
    }
    if let Some(weakness) = password_weakness(&request.password) {
        return Err(AppError::InvalidRequest(weakness.to_string()));
    }

    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(&state.pool)
        .await?;
    if taken {
        return Err(AppError::EmailTaken);
    }

    // Bootstrap rule: the very first user administers the instance.
    let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.pool)
        .await?;
    let role = if user_count == 0 { Role::Admin } else { Role::User };

    let password_hash = hash_password(&request.password)?;
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password_hash, role, phone)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(&email)
    .bind(&password_hash)
    .bind(role.as_str())
    .bind(&request.phone)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(user = %user.id, role = role.as_str(), "user registered");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// `POST /api/v1/auth/login`
///
/// Verifies credentials, issues a session token, and stamps
/// `last_login_at`. Unknown email and wrong password are indistinguishable
/// to the caller.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = request.email.trim().to_lowercase();
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&request.password, &user.password_hash) {
        return Err(AppError::InvalidCredentials);
    }

    let token = generate_token();
    let expires_at = Utc::now() + Duration::hours(state.config.session_ttl_hours);
    sqlx::query("INSERT INTO sessions (user_id, token_hash, expires_at) VALUES ($1, $2, $3)")
        .bind(user.id)
        .bind(hash_secret(&token))
        .bind(expires_at)
        .execute(&state.pool)
        .await?;

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET last_login_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(user.id)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(user = %user.id, "login");

    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

/// `POST /api/v1/auth/logout`
///
/// Deletes the session backing the presented token. Returns 204.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<StatusCode, AppError> {
    sqlx::query("DELETE FROM sessions WHERE id = $1")
        .bind(session.session_id)
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/v1/auth/me`
pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<UserResponse>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(session.user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::InvalidSession)?;

    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_passwords_are_rejected_with_reason() {
        assert!(password_weakness("abc1").unwrap().contains("8 characters"));
        assert!(password_weakness("12345678").unwrap().contains("letter"));
        assert!(password_weakness("abcdefgh").unwrap().contains("digit"));
    }

    #[test]
    fn acceptable_password_passes() {
        assert_eq!(password_weakness("hunter42x"), None);
    }

    #[test]
    fn password_hash_round_trips_and_rejects_wrong_password() {
        let hash = hash_password("hunter42x").unwrap();
        assert!(verify_password("hunter42x", &hash));
        assert!(!verify_password("hunter42y", &hash));
        assert!(!verify_password("hunter42x", "not-a-hash"));
    }

    #[test]
    fn tokens_are_64_hex_chars_and_distinct() {
        let a = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, generate_token());
    }
}
