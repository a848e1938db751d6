//! API key model for the public ingestion endpoint.
//!
//! Keys authenticate external web forms posting to `/public/v1/contacts`.
//! Only the SHA-256 hash of a key is stored; the plaintext is shown exactly
//! once, at creation. Revocation is logical (the row is kept for audit),
//! and the Active/Revoked distinction is a real enum rather than a nullable
//! timestamp so service code has to handle both states explicitly.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, Row, postgres::PgRow};
use uuid::Uuid;

/// Lifecycle state of an API key.
///
/// Built from the nullable `revoked_at` column; a revoked key always knows
/// when it was revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Active,
    Revoked(DateTime<Utc>),
}

impl KeyStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, KeyStatus::Active)
    }

    /// The `revoked_at` column value this state maps back to.
    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        match self {
            KeyStatus::Active => None,
            KeyStatus::Revoked(at) => Some(*at),
        }
    }
}

/// An API key record from the database.
#[derive(Debug, Clone)]
pub struct ApiKey {
    pub id: Uuid,

    /// Owning user; public submissions through this key land in their
    /// contact set.
    pub user_id: Uuid,

    /// Human-readable label ("website form", "landing page", ...).
    pub name: String,

    /// SHA-256 hash of the plaintext key (64 hex characters).
    pub key_hash: String,

    /// Last 4 characters of the plaintext, kept for display in key lists.
    pub key_suffix: String,

    pub status: KeyStatus,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for ApiKey {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let revoked_at: Option<DateTime<Utc>> = row.try_get("revoked_at")?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            key_hash: row.try_get("key_hash")?,
            key_suffix: row.try_get("key_suffix")?,
            status: match revoked_at {
                None => KeyStatus::Active,
                Some(at) => KeyStatus::Revoked(at),
            },
            last_used_at: row.try_get("last_used_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// API key shape returned to clients (hash never included).
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub name: String,
    pub key_suffix: String,
    pub active: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            name: key.name,
            key_suffix: key.key_suffix,
            active: key.status.is_active(),
            revoked_at: key.status.revoked_at(),
            last_used_at: key.last_used_at,
            created_at: key.created_at,
        }
    }
}

/// Response for key creation: the regular shape plus the plaintext secret,
/// returned this one time only.
#[derive(Debug, Serialize)]
pub struct CreatedApiKeyResponse {
    #[serde(flatten)]
    pub key: ApiKeyResponse,

    /// Full plaintext API key. Not stored anywhere; losing it means
    /// creating a new key.
    pub plaintext_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_status_has_no_revocation_timestamp() {
        let status = KeyStatus::Active;
        assert!(status.is_active());
        assert_eq!(status.revoked_at(), None);
    }

    #[test]
    fn revoked_status_carries_its_timestamp() {
        let at = Utc::now();
        let status = KeyStatus::Revoked(at);
        assert!(!status.is_active());
        assert_eq!(status.revoked_at(), Some(at));
    }

    #[test]
    fn response_reflects_lifecycle_state() {
        let at = Utc::now();
        let key = ApiKey {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "website form".to_string(),
            key_hash: "0".repeat(64),
            key_suffix: "ab12".to_string(),
            status: KeyStatus::Revoked(at),
            last_used_at: None,
            created_at: at,
        };
        let response = ApiKeyResponse::from(key);
        assert!(!response.active);
        assert_eq!(response.revoked_at, Some(at));
        assert_eq!(response.key_suffix, "ab12");
    }
}
