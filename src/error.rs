//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::models::contact::ContactResponse;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Missing/expired session, bad credentials,
///   invalid or revoked API key
/// - **Resource Errors**: Requested resources not found
/// - **Business Logic Errors**: Duplicate contacts, API-key limits,
///   revoking an already-revoked key
/// - **Validation Errors**: Invalid request data
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// Wraps any sqlx::Error via `#[from]`. Inside batch ingestion this is
    /// the fatal path: the surrounding transaction rolls back and the caller
    /// gets a single 500 with no per-record detail, since nothing committed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Session token is missing, unknown, or expired.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid or expired session")]
    InvalidSession,

    /// Email/password pair did not match a user.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// API key is missing, unknown, or revoked.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Authenticated user lacks the required role.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Admin access required")]
    Forbidden,

    /// Registration attempted with an email that is already taken.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("Email is already registered")]
    EmailTaken,

    /// Requested contact does not exist or belongs to another user.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Contact not found")]
    ContactNotFound,

    /// Requested API key does not exist or belongs to another user.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("API key not found")]
    ApiKeyNotFound,

    /// The key targeted for revocation is already revoked.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("API key is already revoked")]
    ApiKeyAlreadyRevoked,

    /// User already holds the maximum number of active API keys.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Active API key limit reached")]
    ApiKeyLimitReached,

    /// A contact with the same phone or email already exists for this user.
    ///
    /// Not a failure but a first-class classification outcome; carries the
    /// pre-existing record so the caller can show or merge it. Returns
    /// HTTP 409 Conflict with the record in the body.
    #[error("A matching contact already exists")]
    DuplicateContact(Box<ContactResponse>),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

/// Convert AppError into an HTTP response.
///
/// This implementation allows Axum handlers to return `Result<T, AppError>`
/// and have errors automatically converted to proper HTTP responses.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// The `DuplicateContact` variant additionally carries the colliding record
/// under a top-level `existing` key.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // The duplicate conflict has a richer body than the plain envelope
        if let AppError::DuplicateContact(existing) = self {
            let body = Json(json!({
                "error": {
                    "code": "duplicate_contact",
                    "message": "A matching contact already exists"
                },
                "existing": existing,
            }));
            return (StatusCode::CONFLICT, body).into_response();
        }

        // Map each error variant to (HTTP status, error code, message)
        let (status, code, message) = match self {
            AppError::InvalidSession => {
                (StatusCode::UNAUTHORIZED, "invalid_session", self.to_string())
            }
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                self.to_string(),
            ),
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string()),
            AppError::EmailTaken => (StatusCode::CONFLICT, "email_taken", self.to_string()),
            AppError::ContactNotFound => {
                (StatusCode::NOT_FOUND, "contact_not_found", self.to_string())
            }
            AppError::ApiKeyNotFound => {
                (StatusCode::NOT_FOUND, "api_key_not_found", self.to_string())
            }
            AppError::ApiKeyAlreadyRevoked => (
                StatusCode::CONFLICT,
                "api_key_already_revoked",
                self.to_string(),
            ),
            AppError::ApiKeyLimitReached => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "api_key_limit_reached",
                self.to_string(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
            AppError::DuplicateContact(_) => unreachable!("handled above"),
        };

        // Build JSON response body
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
