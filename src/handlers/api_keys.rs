//! API key management HTTP handlers.

use crate::{
    AppState,
    error::AppError,
    middleware::auth::SessionContext,
    models::api_key::{ApiKeyResponse, CreatedApiKeyResponse},
    services::api_keys,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

/// Request body for `POST /api/v1/keys`.
#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
}

/// `POST /api/v1/keys`
///
/// Creates a key and returns 201 with the plaintext included — the only
/// time it is ever shown. At most 5 active keys per user.
pub async fn create_key(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (key, plaintext) = api_keys::create_key(&state.pool, session.user_id, &request.name).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedApiKeyResponse {
            key: key.into(),
            plaintext_key: plaintext,
        }),
    ))
}

/// `GET /api/v1/keys`
///
/// All of the user's keys, revoked ones included, hashes never serialized.
pub async fn list_keys(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Vec<ApiKeyResponse>>, AppError> {
    let keys = api_keys::list_keys(&state.pool, session.user_id).await?;

    Ok(Json(keys.into_iter().map(Into::into).collect()))
}

/// `DELETE /api/v1/keys/{id}`
///
/// Logical revocation; the row stays for audit. 204 on success, 409 if the
/// key is already revoked.
pub async fn revoke_key(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(key_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    api_keys::revoke_key(&state.pool, session.user_id, key_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
