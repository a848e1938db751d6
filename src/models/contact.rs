//! Contact data models and ingestion request/response types.
//!
//! This module defines:
//! - `Contact`: database entity, one row per contact, owned by one user
//! - `Source` / `Consent`: closed enums backing the TEXT columns
//! - `IncomingContact`: the unvalidated field bag accepted at every
//!   ingestion entry point (single create, batch, public form)
//! - `ContactDraft`: a validated, defaulted record ready for insertion
//! - batch bucket types (`BatchOutcome`, `DuplicateEntry`, `ErrorEntry`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};
use uuid::Uuid;

/// Where a contact record originally came from.
///
/// Stored as TEXT; unknown tags are rejected during validation rather than
/// carried around as open strings. Public form submissions are always
/// recorded as `Form`, whatever the caller claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    OcrList,
    Form,
    Import,
    Manual,
}

impl Source {
    /// Parse an inbound tag. `None` means the tag is not a known source.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "ocr_list" => Some(Source::OcrList),
            "form" => Some(Source::Form),
            "import" => Some(Source::Import),
            "manual" => Some(Source::Manual),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::OcrList => "ocr_list",
            Source::Form => "form",
            Source::Import => "import",
            Source::Manual => "manual",
        }
    }
}

/// Outreach consent recorded for a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consent {
    OptIn,
    OptOut,
    Unknown,
}

impl Consent {
    /// Parse an inbound tag. `None` means the tag is not a known consent.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "opt_in" => Some(Consent::OptIn),
            "opt_out" => Some(Consent::OptOut),
            "unknown" => Some(Consent::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Consent::OptIn => "opt_in",
            Consent::OptOut => "opt_out",
            Consent::Unknown => "unknown",
        }
    }
}

/// A contact record from the database.
///
/// Each contact belongs to exactly one user (`user_id`); every query that
/// touches this table filters on it. The `phone` column holds the canonical
/// `+`-prefixed form for rows written by this service, but legacy imports may
/// hold unnormalized strings — the duplicate matcher re-normalizes stored
/// values before comparing instead of trusting the column.
#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    pub id: Uuid,

    /// Owning user; the tenancy boundary for all duplicate checks.
    pub user_id: Uuid,

    pub full_name: String,

    /// Canonical phone form (see `crate::phone`).
    pub phone: String,

    pub email: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,

    pub source: Source,
    pub consent: Consent,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for Contact {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        // source/consent are plain TEXT columns; parse them through the
        // closed enums so an unknown tag in the database surfaces as a
        // decode error instead of leaking out as an open string.
        let source_tag: String = row.try_get("source")?;
        let source = Source::parse(&source_tag).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "source".to_string(),
            source: format!("unknown source tag {source_tag:?}").into(),
        })?;
        let consent_tag: String = row.try_get("consent")?;
        let consent = Consent::parse(&consent_tag).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "consent".to_string(),
            source: format!("unknown consent tag {consent_tag:?}").into(),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            full_name: row.try_get("full_name")?,
            phone: row.try_get("phone")?,
            email: row.try_get("email")?,
            company: row.try_get("company")?,
            job_title: row.try_get("job_title")?,
            source,
            consent,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Contact shape returned to API clients (drops the internal `user_id`).
#[derive(Debug, Clone, Serialize)]
pub struct ContactResponse {
    pub id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub source: Source,
    pub consent: Consent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Contact> for ContactResponse {
    fn from(contact: Contact) -> Self {
        Self {
            id: contact.id,
            full_name: contact.full_name,
            phone: contact.phone,
            email: contact.email,
            company: contact.company,
            job_title: contact.job_title,
            source: contact.source,
            consent: contact.consent,
            created_at: contact.created_at,
            updated_at: contact.updated_at,
        }
    }
}

/// One inbound contact record before validation.
///
/// Batch callers and external web forms send loosely-shaped field bags, so
/// everything is optional here and `source`/`consent` arrive as raw tags.
/// External clients use camelCase (`fullName`, `jobTitle`); the serde
/// aliases below are the single place that convention is mapped onto the
/// storage casing.
///
/// The struct also serializes: duplicate and error buckets echo the
/// offending input back to the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncomingContact {
    #[serde(default, alias = "fullName", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,

    #[serde(default, alias = "jobTitle", skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent: Option<String>,
}

/// A validated, defaulted record ready for insertion.
///
/// `phone` is canonical, `email` is trimmed, and `source`/`consent` have
/// been resolved against their enums (with defaults applied).
#[derive(Debug, Clone)]
pub struct ContactDraft {
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub source: Source,
    pub consent: Consent,
}

/// Request body for `POST /api/v1/contacts/batch`.
#[derive(Debug, Deserialize)]
pub struct BatchIngestRequest {
    pub contacts: Vec<IncomingContact>,
}

/// A record classified as a duplicate, paired with the row it collided with.
#[derive(Debug, Serialize)]
pub struct DuplicateEntry {
    pub input: IncomingContact,
    pub existing: ContactResponse,
}

/// A record that failed validation, paired with the reason.
#[derive(Debug, Serialize)]
pub struct ErrorEntry {
    pub input: IncomingContact,
    pub message: String,
}

/// The three-bucket result of a batch ingestion call.
///
/// Every input record lands in exactly one bucket; each bucket preserves
/// first-seen order relative to the input.
#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub created: Vec<ContactResponse>,
    pub duplicates: Vec<DuplicateEntry>,
    pub errors: Vec<ErrorEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn source_tags_round_trip_and_reject_unknown() {
        for tag in ["ocr_list", "form", "import", "manual"] {
            assert_eq!(Source::parse(tag).unwrap().as_str(), tag);
        }
        assert_eq!(Source::parse("api"), None);
        assert_eq!(Source::parse("Manual"), None);
    }

    #[test]
    fn consent_tags_round_trip_and_reject_unknown() {
        for tag in ["opt_in", "opt_out", "unknown"] {
            assert_eq!(Consent::parse(tag).unwrap().as_str(), tag);
        }
        assert_eq!(Consent::parse("yes"), None);
    }

    #[test]
    fn incoming_contact_accepts_camel_case_aliases() {
        let input: IncomingContact = serde_json::from_value(json!({
            "fullName": "Ani Wijaya",
            "jobTitle": "Procurement Lead",
            "phone": "081234567890"
        }))
        .unwrap();

        assert_eq!(input.full_name.as_deref(), Some("Ani Wijaya"));
        assert_eq!(input.job_title.as_deref(), Some("Procurement Lead"));
        assert_eq!(input.phone.as_deref(), Some("081234567890"));
        assert_eq!(input.email, None);
    }

    #[test]
    fn incoming_contact_accepts_snake_case() {
        let input: IncomingContact = serde_json::from_value(json!({
            "full_name": "Budi Santoso",
            "job_title": "CTO",
            "source": "import"
        }))
        .unwrap();

        assert_eq!(input.full_name.as_deref(), Some("Budi Santoso"));
        assert_eq!(input.job_title.as_deref(), Some("CTO"));
        assert_eq!(input.source.as_deref(), Some("import"));
    }

    #[test]
    fn incoming_contact_echo_omits_absent_fields() {
        let input = IncomingContact {
            full_name: Some("Citra".to_string()),
            ..Default::default()
        };
        let echoed = serde_json::to_value(&input).unwrap();
        assert_eq!(echoed, json!({"full_name": "Citra"}));
    }
}
