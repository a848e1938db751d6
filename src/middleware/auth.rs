//! Authentication middleware.
//!
//! Two independent authentication schemes guard the two route groups:
//!
//! - **Session auth** for the interactive API: `Authorization: Bearer
//!   <token>` where the token was issued at login. Only the SHA-256 hash of
//!   a token is stored, so the lookup hashes first and compares hashes.
//! - **API-key auth** for the public ingestion endpoint: `Authorization:
//!   Bearer <key>` or `X-Api-Key: <key>`, resolved against active (not
//!   revoked) keys. A successful lookup also stamps `last_used_at`.
//!
//! Both inject a context struct into the request's extension map for route
//! handlers to extract; the context carries the explicit owner id that every
//! core call is scoped by.

use crate::{
    db::DbPool,
    error::AppError,
    models::user::Role,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Context attached to session-authenticated requests.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Authenticated user; the owner id threaded through every core call.
    pub user_id: Uuid,

    /// Role, checked by [`require_admin`] for the admin surface.
    pub role: Role,

    /// Session row backing this request, needed by logout.
    pub session_id: Uuid,
}

/// Context attached to API-key-authenticated public requests.
#[derive(Debug, Clone)]
pub struct ApiKeyContext {
    /// The key that authenticated this request.
    pub api_key_id: Uuid,

    /// The key's owner; public submissions land in this user's contact set.
    pub owner_id: Uuid,
}

/// SHA-256 a secret (session token or API key) into the hex form stored in
/// the database.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pull a bearer token out of the Authorization header.
fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Session authentication middleware for `/api/v1` routes.
///
/// Hashes the bearer token, joins sessions to users, and rejects unknown or
/// expired sessions with 401. On success a [`SessionContext`] is inserted
/// into the request extensions.
pub async fn session_auth(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request).ok_or(AppError::InvalidSession)?;
    let token_hash = hash_secret(token);

    let row: Option<(Uuid, Uuid, String)> = sqlx::query_as(
        r#"
        SELECT s.id, u.id, u.role
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token_hash = $1 AND s.expires_at > NOW()
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(&pool)
    .await?;

    let (session_id, user_id, role_tag) = row.ok_or(AppError::InvalidSession)?;
    let role = Role::parse(&role_tag).ok_or(AppError::InvalidSession)?;

    request.extensions_mut().insert(SessionContext {
        user_id,
        role,
        session_id,
    });

    Ok(next.run(request).await)
}

/// Admin gate layered on top of [`session_auth`] for `/api/v1/admin` routes.
///
/// Reads the already-injected [`SessionContext`] and rejects non-admin users
/// with 403.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let session = request
        .extensions()
        .get::<SessionContext>()
        .ok_or(AppError::InvalidSession)?;

    if session.role != Role::Admin {
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}

/// API-key authentication middleware for the public ingestion endpoint.
///
/// Accepts the key as either a bearer token or an `X-Api-Key` header, hashes
/// it, and resolves it against active keys only. Revoked keys fail exactly
/// like unknown ones so callers cannot distinguish the two. The key's
/// `last_used_at` is stamped on every successful authentication.
pub async fn api_key_auth(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = bearer_token(&request)
        .or_else(|| {
            request
                .headers()
                .get("X-Api-Key")
                .and_then(|h| h.to_str().ok())
        })
        .ok_or(AppError::InvalidApiKey)?;
    let key_hash = hash_secret(key);

    let row: Option<(Uuid, Uuid)> = sqlx::query_as(
        "SELECT id, user_id FROM api_keys WHERE key_hash = $1 AND revoked_at IS NULL",
    )
    .bind(&key_hash)
    .fetch_optional(&pool)
    .await?;

    let (api_key_id, owner_id) = row.ok_or(AppError::InvalidApiKey)?;

    sqlx::query("UPDATE api_keys SET last_used_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(api_key_id)
        .execute(&pool)
        .await?;

    request.extensions_mut().insert(ApiKeyContext {
        api_key_id,
        owner_id,
    });

    Ok(next.run(request).await)
}
