//! Duplicate detection for contacts.
//!
//! Matching is two-phase. The database does a deliberately loose prefilter
//! (substring on the last 9 digits of the phone, or lowercased email
//! equality) so it never needs to understand normalization rules; the exact
//! pass then re-normalizes every candidate's stored phone in memory and
//! requires strict equality before declaring a duplicate. Legacy rows stored
//! before normalization existed still match this way.
//!
//! All matching is scoped to one owner: a contact under user A never
//! collides with the same phone under user B.

use crate::{db::DbPool, error::AppError, models::contact::Contact, phone};
use uuid::Uuid;

/// The substring the SQL prefilter searches for: the last 9 digits of the
/// normalized phone, or the whole string when it is shorter than that.
fn phone_tail(normalized: &str) -> &str {
    let len = normalized.len();
    &normalized[len.saturating_sub(9)..]
}

/// Exact pass over prefiltered candidates.
///
/// Phone equality (in normalized comparison form) is checked over all
/// candidates before email equality is considered at all, so a phone match
/// always wins when both would hit different candidates.
fn select_match<'a>(
    candidates: &'a [Contact],
    normalized_phone: Option<&str>,
    email: Option<&str>,
) -> Option<&'a Contact> {
    if let Some(input_phone) = normalized_phone {
        for candidate in candidates {
            if phone::normalize_for_comparison(&candidate.phone).as_deref() == Some(input_phone) {
                return Some(candidate);
            }
        }
    }

    if let Some(input_email) = email {
        let input_email = input_email.trim().to_lowercase();
        if input_email.is_empty() {
            return None;
        }
        for candidate in candidates {
            let candidate_email = candidate
                .email
                .as_deref()
                .map(|e| e.trim().to_lowercase());
            if candidate_email.as_deref() == Some(input_email.as_str()) {
                return Some(candidate);
            }
        }
    }

    None
}

/// Find an existing contact of `owner_id` matching the given phone or email.
///
/// `exclude` skips one row, used by the update path so a contact does not
/// collide with itself.
///
/// Returns the matching contact, or `None` when the phone/email pair is new
/// to this owner.
pub async fn find_duplicate(
    pool: &DbPool,
    owner_id: Uuid,
    raw_phone: &str,
    email: Option<&str>,
    exclude: Option<Uuid>,
) -> Result<Option<Contact>, AppError> {
    let normalized = phone::normalize_for_comparison(raw_phone);
    let email = email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty());

    if normalized.is_none() && email.is_none() {
        return Ok(None);
    }

    let phone_pattern = normalized
        .as_deref()
        .map(|n| format!("%{}%", phone_tail(n)));

    // Loose prefilter; correctness comes from the exact pass below.
    let candidates = sqlx::query_as::<_, Contact>(
        r#"
        SELECT * FROM contacts
        WHERE user_id = $1
          AND ($4::uuid IS NULL OR id <> $4)
          AND (
            ($2::text IS NOT NULL AND phone LIKE $2)
            OR ($3::text IS NOT NULL AND lower(email) = $3)
          )
        "#,
    )
    .bind(owner_id)
    .bind(&phone_pattern)
    .bind(&email)
    .bind(exclude)
    .fetch_all(pool)
    .await?;

    Ok(select_match(&candidates, normalized.as_deref(), email.as_deref()).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::contact::{Consent, Source};
    use chrono::Utc;

    fn contact(phone: &str, email: Option<&str>) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            full_name: "Test Contact".to_string(),
            phone: phone.to_string(),
            email: email.map(str::to_string),
            company: None,
            job_title: None,
            source: Source::Manual,
            consent: Consent::Unknown,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn comparison(raw: &str) -> Option<String> {
        phone::normalize_for_comparison(raw)
    }

    #[test]
    fn tail_is_last_nine_characters() {
        assert_eq!(phone_tail("6281234567890"), "234567890");
        assert_eq!(phone_tail("628123456"), "628123456");
    }

    #[test]
    fn short_phone_tail_degenerates_to_whole_string() {
        assert_eq!(phone_tail("62812"), "62812");
        assert_eq!(phone_tail(""), "");
    }

    #[test]
    fn cross_format_phone_matches() {
        // Stored canonical, submitted in Indonesian local format.
        let existing = [contact("+6281234567890", None)];
        let input = comparison("081234567890");
        let hit = select_match(&existing, input.as_deref(), None);
        assert_eq!(hit.map(|c| c.id), Some(existing[0].id));
    }

    #[test]
    fn legacy_unnormalized_stored_phone_matches() {
        // Row written before normalization existed, digits only.
        let existing = [contact("081234567890", None)];
        let input = comparison("+6281234567890");
        let hit = select_match(&existing, input.as_deref(), None);
        assert_eq!(hit.map(|c| c.id), Some(existing[0].id));
    }

    #[test]
    fn email_matches_case_insensitively() {
        let existing = [contact("+628111111111", Some("Ani@Example.com"))];
        let input = comparison("+628222222222");
        let hit = select_match(&existing, input.as_deref(), Some("ani@example.com "));
        assert_eq!(hit.map(|c| c.id), Some(existing[0].id));
    }

    #[test]
    fn phone_match_wins_over_email_match() {
        // Candidate 0 matches by email, candidate 1 by phone; the phone
        // pass runs to completion before email is considered.
        let by_email = contact("+628111111111", Some("x@y.com"));
        let by_phone = contact("+6281234567890", Some("other@y.com"));
        let existing = [by_email.clone(), by_phone.clone()];
        let input = comparison("081234567890");
        let hit = select_match(&existing, input.as_deref(), Some("x@y.com"));
        assert_eq!(hit.map(|c| c.id), Some(by_phone.id));
    }

    #[test]
    fn no_match_when_phone_and_email_differ() {
        let existing = [contact("+6281234567890", Some("a@b.com"))];
        let input = comparison("+6289999999999");
        assert!(select_match(&existing, input.as_deref(), Some("c@d.com")).is_none());
    }

    #[test]
    fn empty_email_never_matches() {
        let existing = [contact("+6281234567890", Some(""))];
        assert!(select_match(&existing, None, Some("  ")).is_none());
    }
}
