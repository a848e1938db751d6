//! API key lifecycle: creation, listing, logical revocation.
//!
//! A key's plaintext exists only in the creation response; the database
//! holds its SHA-256 hash plus the last four characters for display.
//! Revocation flips the key to `Revoked` and keeps the row for audit.

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::hash_secret,
    models::api_key::{ApiKey, KeyStatus},
};
use chrono::Utc;
use uuid::Uuid;

/// Maximum concurrently active (non-revoked) keys per user.
pub const MAX_ACTIVE_KEYS: i64 = 5;

/// Generate a fresh plaintext key: 32 random bytes as 64 hex characters.
fn generate_key() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// The display suffix stored alongside the hash: the last 4 characters of
/// the plaintext.
fn key_suffix(plaintext: &str) -> String {
    plaintext
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect()
}

/// Create a new API key for `owner_id`.
///
/// Enforces the active-key cap before generating anything. Returns the
/// stored record together with the plaintext, which is never recoverable
/// afterwards.
pub async fn create_key(
    pool: &DbPool,
    owner_id: Uuid,
    name: &str,
) -> Result<(ApiKey, String), AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest("name is required".to_string()));
    }

    let active_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM api_keys WHERE user_id = $1 AND revoked_at IS NULL",
    )
    .bind(owner_id)
    .fetch_one(pool)
    .await?;

    if active_count >= MAX_ACTIVE_KEYS {
        return Err(AppError::ApiKeyLimitReached);
    }

    let plaintext = generate_key();
    let key = sqlx::query_as::<_, ApiKey>(
        r#"
        INSERT INTO api_keys (user_id, name, key_hash, key_suffix)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(owner_id)
    .bind(name)
    .bind(hash_secret(&plaintext))
    .bind(key_suffix(&plaintext))
    .fetch_one(pool)
    .await?;

    tracing::info!(owner = %owner_id, key = %key.id, "api key created");

    Ok((key, plaintext))
}

/// List all of `owner_id`'s keys, newest first, revoked ones included.
pub async fn list_keys(pool: &DbPool, owner_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
    let keys = sqlx::query_as::<_, ApiKey>(
        "SELECT * FROM api_keys WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(keys)
}

/// Logically revoke one of `owner_id`'s keys.
///
/// The row is never deleted. Revoking a key that is already revoked is a
/// conflict, not a no-op.
pub async fn revoke_key(pool: &DbPool, owner_id: Uuid, key_id: Uuid) -> Result<ApiKey, AppError> {
    let key = sqlx::query_as::<_, ApiKey>(
        "SELECT * FROM api_keys WHERE id = $1 AND user_id = $2",
    )
    .bind(key_id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::ApiKeyNotFound)?;

    match key.status {
        KeyStatus::Revoked(_) => Err(AppError::ApiKeyAlreadyRevoked),
        KeyStatus::Active => {
            let revoked = sqlx::query_as::<_, ApiKey>(
                "UPDATE api_keys SET revoked_at = $1 WHERE id = $2 RETURNING *",
            )
            .bind(Utc::now())
            .bind(key_id)
            .fetch_one(pool)
            .await?;

            tracing::info!(owner = %owner_id, key = %key_id, "api key revoked");
            Ok(revoked)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_64_hex_chars_and_distinct() {
        let a = generate_key();
        let b = generate_key();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn suffix_is_last_four_characters() {
        assert_eq!(key_suffix("abcdef1234"), "1234");
        assert_eq!(key_suffix("ab"), "ab");
    }

    #[test]
    fn hash_is_stable_and_distinct_from_plaintext() {
        let plaintext = generate_key();
        let hash = hash_secret(&plaintext);
        assert_eq!(hash, hash_secret(&plaintext));
        assert_ne!(hash, plaintext);
        assert_eq!(hash.len(), 64);
    }
}
