//! Admin HTTP handlers.

use crate::{AppState, error::AppError, services::stats};
use axum::{Json, extract::State};

/// `GET /api/v1/admin/stats`
///
/// System-wide aggregates. Reachable only through the admin middleware
/// layer, so no role check happens here.
pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<stats::AdminStats>, AppError> {
    let stats = stats::collect(&state.pool).await?;

    Ok(Json(stats))
}
