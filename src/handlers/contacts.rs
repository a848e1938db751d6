//! Contact management HTTP handlers.
//!
//! Every query here filters on the authenticated user's id, so one user's
//! contacts are invisible to another's requests; a foreign id simply reads
//! as "not found". Creation and update delegate to the ingestion service,
//! which owns validation and duplicate detection.

use crate::{
    AppState,
    error::AppError,
    middleware::auth::SessionContext,
    models::contact::{BatchIngestRequest, BatchOutcome, Contact, ContactResponse, IncomingContact},
    services::ingestion::{self, IngestOrigin},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// `POST /api/v1/contacts`
///
/// Single-create path: validates, runs the duplicate matcher, and returns
/// 201 with the created contact, or 409 carrying the existing record on a
/// duplicate hit.
pub async fn create_contact(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(input): Json<IncomingContact>,
) -> Result<impl IntoResponse, AppError> {
    let contact =
        ingestion::create_contact(&state.pool, session.user_id, input, IngestOrigin::Direct)
            .await?;

    Ok((StatusCode::CREATED, Json(ContactResponse::from(contact))))
}

/// `POST /api/v1/contacts/batch`
///
/// Batch ingestion: up to 100 records in one transaction, classified into
/// `created` / `duplicates` / `errors`. Always 200 with the three buckets
/// on normal completion; only an oversized/empty batch or a storage failure
/// produces an error response for the whole call.
pub async fn batch_ingest(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(request): Json<BatchIngestRequest>,
) -> Result<Json<BatchOutcome>, AppError> {
    let outcome = ingestion::ingest_batch(&state.pool, session.user_id, request.contacts).await?;

    Ok(Json(outcome))
}

/// `GET /api/v1/contacts`
///
/// All of the user's contacts, newest first.
pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Vec<ContactResponse>>, AppError> {
    let contacts = sqlx::query_as::<_, Contact>(
        "SELECT * FROM contacts WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(session.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(contacts.into_iter().map(Into::into).collect()))
}

/// `GET /api/v1/contacts/{id}`
pub async fn get_contact(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(contact_id): Path<Uuid>,
) -> Result<Json<ContactResponse>, AppError> {
    let contact =
        sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1 AND user_id = $2")
            .bind(contact_id)
            .bind(session.user_id)
            .fetch_optional(&state.pool)
            .await?
            .ok_or(AppError::ContactNotFound)?;

    Ok(Json(contact.into()))
}

/// `PUT /api/v1/contacts/{id}`
///
/// Full update. The phone is re-canonicalized and the duplicate matcher
/// re-runs (excluding this row) so edits cannot introduce a duplicate.
pub async fn update_contact(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(contact_id): Path<Uuid>,
    Json(input): Json<IncomingContact>,
) -> Result<Json<ContactResponse>, AppError> {
    let contact =
        ingestion::update_contact(&state.pool, session.user_id, contact_id, input).await?;

    Ok(Json(contact.into()))
}

/// `DELETE /api/v1/contacts/{id}`
pub async fn delete_contact(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(contact_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("DELETE FROM contacts WHERE id = $1 AND user_id = $2")
        .bind(contact_id)
        .bind(session.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::ContactNotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}
