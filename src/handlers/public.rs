//! Public ingestion endpoint for external web forms.
//!
//! Gated by API-key auth rather than sessions. Submissions land in the
//! contact set of the key's owner, and `source` is always recorded as
//! `form` regardless of what the form posted.

use crate::{
    AppState,
    error::AppError,
    middleware::auth::ApiKeyContext,
    models::contact::{ContactResponse, IncomingContact},
    services::ingestion::{self, IngestOrigin},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

/// `POST /public/v1/contacts`
///
/// Same single-ingestion path as the authenticated create: 201 with the
/// created contact, 409 carrying the existing one on a duplicate hit.
pub async fn submit_contact(
    State(state): State<AppState>,
    Extension(key): Extension<ApiKeyContext>,
    Json(input): Json<IncomingContact>,
) -> Result<impl IntoResponse, AppError> {
    let contact =
        ingestion::create_contact(&state.pool, key.owner_id, input, IngestOrigin::PublicForm)
            .await?;

    tracing::info!(owner = %key.owner_id, key = %key.api_key_id, "public form submission");

    Ok((StatusCode::CREATED, Json(ContactResponse::from(contact))))
}
