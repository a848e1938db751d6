//! Aggregate statistics for the admin surface.

use crate::{db::DbPool, error::AppError};
use serde::Serialize;
use std::collections::HashMap;

/// System-wide aggregates shown on the admin dashboard.
#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub total_users: i64,
    pub total_contacts: i64,
    pub active_api_keys: i64,
    pub contacts_by_source: HashMap<String, i64>,
    pub contacts_by_consent: HashMap<String, i64>,
    pub contacts_last_7_days: i64,
}

/// Collect the admin aggregates.
pub async fn collect(pool: &DbPool) -> Result<AdminStats, AppError> {
    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    let total_contacts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contacts")
        .fetch_one(pool)
        .await?;

    let active_api_keys: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM api_keys WHERE revoked_at IS NULL")
            .fetch_one(pool)
            .await?;

    let by_source: Vec<(String, i64)> =
        sqlx::query_as("SELECT source, COUNT(*) FROM contacts GROUP BY source")
            .fetch_all(pool)
            .await?;

    let by_consent: Vec<(String, i64)> =
        sqlx::query_as("SELECT consent, COUNT(*) FROM contacts GROUP BY consent")
            .fetch_all(pool)
            .await?;

    let contacts_last_7_days: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM contacts WHERE created_at > NOW() - INTERVAL '7 days'",
    )
    .fetch_one(pool)
    .await?;

    Ok(AdminStats {
        total_users,
        total_contacts,
        active_api_keys,
        contacts_by_source: by_source.into_iter().collect(),
        contacts_by_consent: by_consent.into_iter().collect(),
        contacts_last_7_days,
    })
}
