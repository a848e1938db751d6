//! Contact ingestion: the single-create path and the batch coordinator.
//!
//! Every entry point (authenticated create, batch import, public web form)
//! funnels through the same validation and duplicate detection here. Batch
//! ingestion classifies each record into exactly one of three buckets:
//!
//! - `created`: passed validation, no duplicate, persisted
//! - `duplicates`: collided with a persisted contact or with an earlier
//!   record in the same batch; carries the colliding record
//! - `errors`: failed field validation; carries the reason
//!
//! Duplicate detection keys on the normalized comparison form of the phone
//! (and the trimmed, lowercased email) in both the persisted and the
//! batch-local check, the same strategy `dedup` applies on the single path.
//!
//! # Atomicity
//!
//! The whole batch runs inside one PostgreSQL transaction. Validation
//! failures and duplicates are bucketed, never thrown; any unexpected
//! storage error propagates, rolls the transaction back, and nothing from
//! the batch is left committed. On normal completion all three buckets
//! commit together.

use std::collections::HashMap;

use crate::{
    db::DbPool,
    error::AppError,
    models::contact::{
        BatchOutcome, Consent, Contact, ContactDraft, DuplicateEntry, ErrorEntry,
        IncomingContact, Source,
    },
    phone,
    services::dedup,
};
use uuid::Uuid;

/// Hard cap on records per batch call. Larger batches are rejected
/// wholesale before any row is touched.
pub const MAX_BATCH_SIZE: usize = 100;

/// Which entry point a record came through; decides source defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOrigin {
    /// Authenticated create or batch import: `source` honored from input,
    /// defaulting to `manual`.
    Direct,

    /// Public web-form submission: `source` is forced to `form` regardless
    /// of what the caller sent, for provenance.
    PublicForm,
}

/// Minimal well-formedness check: one `@` with non-empty sides, no
/// whitespace, and a dot somewhere in the domain.
pub(crate) fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.splitn(2, '@');
    let (Some(local), Some(domain)) = (parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Validate one inbound record and resolve defaults into a [`ContactDraft`].
///
/// Returns the validation failure message on error; batch callers bucket
/// it, the single path maps it to a 400.
fn validate(input: &IncomingContact, origin: IngestOrigin) -> Result<ContactDraft, String> {
    let full_name = input
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or("full_name is required")?
        .to_string();

    let raw_phone = input
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or("phone is required")?;
    let canonical_phone =
        phone::normalize(raw_phone).ok_or("phone must contain at least one digit")?;

    let email = match input.email.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(e) if is_valid_email(e) => Some(e.to_string()),
        Some(_) => return Err("email is not a valid address".to_string()),
    };

    let source = match origin {
        IngestOrigin::PublicForm => Source::Form,
        IngestOrigin::Direct => match input.source.as_deref() {
            None => Source::Manual,
            Some(tag) => Source::parse(tag)
                .ok_or_else(|| format!("source must be one of ocr_list, form, import, manual (got {tag:?})"))?,
        },
    };

    let consent = match input.consent.as_deref() {
        None => Consent::Unknown,
        Some(tag) => Consent::parse(tag)
            .ok_or_else(|| format!("consent must be one of opt_in, opt_out, unknown (got {tag:?})"))?,
    };

    Ok(ContactDraft {
        full_name,
        phone: canonical_phone,
        email,
        company: input.company.as_deref().map(str::trim).filter(|c| !c.is_empty()).map(str::to_string),
        job_title: input.job_title.as_deref().map(str::trim).filter(|j| !j.is_empty()).map(str::to_string),
        source,
        consent,
    })
}

/// The comparison keys a record is matched on: normalized phone and
/// lowercased email, either of which may be absent on malformed input.
fn comparison_keys(input: &IncomingContact) -> (Option<String>, Option<String>) {
    let phone_key = input
        .phone
        .as_deref()
        .and_then(phone::normalize_for_comparison);
    let email_key = input
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    (phone_key, email_key)
}

/// Owner's pre-existing contacts relevant to this batch, indexed by
/// comparison key. Built once from two bulk lookups before the loop.
#[derive(Debug, Default)]
struct PersistedIndex {
    by_phone: HashMap<String, Contact>,
    by_email: HashMap<String, Contact>,
}

impl PersistedIndex {
    fn index(candidates: Vec<Contact>) -> Self {
        let mut by_phone = HashMap::new();
        let mut by_email = HashMap::new();
        for candidate in candidates {
            if let Some(key) = phone::normalize_for_comparison(&candidate.phone) {
                by_phone.entry(key).or_insert_with(|| candidate.clone());
            }
            if let Some(email) = candidate.email.as_deref() {
                let key = email.trim().to_lowercase();
                if !key.is_empty() {
                    by_email.entry(key).or_insert(candidate);
                }
            }
        }
        Self { by_phone, by_email }
    }
}

/// Phones/emails already consumed by earlier records in this batch, mapped
/// to the index of the created contact they belong to.
#[derive(Debug, Default)]
struct BatchLedger {
    phones: HashMap<String, usize>,
    emails: HashMap<String, usize>,
}

impl BatchLedger {
    fn lookup(&self, phone_key: Option<&str>, email_key: Option<&str>) -> Option<usize> {
        // Phone before email, mirroring the matcher's tie-break.
        if let Some(index) = phone_key.and_then(|k| self.phones.get(k)) {
            return Some(*index);
        }
        email_key.and_then(|k| self.emails.get(k)).copied()
    }

    fn register(&mut self, phone_key: Option<String>, email_key: Option<String>, index: usize) {
        if let Some(key) = phone_key {
            self.phones.entry(key).or_insert(index);
        }
        if let Some(key) = email_key {
            self.emails.entry(key).or_insert(index);
        }
    }
}

/// What to do with one batch record.
#[derive(Debug)]
enum Decision {
    /// Collides with a pre-existing contact.
    DuplicateOfPersisted(Contact),

    /// Collides with the created contact at this index in the batch.
    DuplicateInBatch(usize),

    /// Valid and new; persist this draft.
    Create(ContactDraft),

    /// Failed validation.
    Reject(String),
}

/// Classify one record against persisted state and the batch ledger.
///
/// Duplicate checks run before validation: a record that repeats an
/// existing phone belongs in `duplicates` even if some other field of it
/// is malformed.
fn classify(
    input: &IncomingContact,
    persisted: &PersistedIndex,
    ledger: &BatchLedger,
    origin: IngestOrigin,
) -> Decision {
    let (phone_key, email_key) = comparison_keys(input);

    if let Some(key) = phone_key.as_deref() {
        if let Some(existing) = persisted.by_phone.get(key) {
            return Decision::DuplicateOfPersisted(existing.clone());
        }
    }
    if let Some(key) = email_key.as_deref() {
        if let Some(existing) = persisted.by_email.get(key) {
            return Decision::DuplicateOfPersisted(existing.clone());
        }
    }

    if let Some(index) = ledger.lookup(phone_key.as_deref(), email_key.as_deref()) {
        return Decision::DuplicateInBatch(index);
    }

    match validate(input, origin) {
        Ok(draft) => Decision::Create(draft),
        Err(message) => Decision::Reject(message),
    }
}

/// Size precheck, run before the transaction opens so a rejected batch
/// touches no rows. Returns the rejection message for empty or oversized
/// input.
fn batch_size_error(len: usize) -> Option<String> {
    if len == 0 {
        return Some("contacts must contain at least one record".to_string());
    }
    if len > MAX_BATCH_SIZE {
        return Some(format!(
            "contacts exceeds the batch limit of {MAX_BATCH_SIZE} records (got {len})"
        ));
    }
    None
}

/// Insert one validated draft for `owner_id`.
async fn insert_contact<'e, E>(
    executor: E,
    owner_id: Uuid,
    draft: &ContactDraft,
) -> Result<Contact, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, Contact>(
        r#"
        INSERT INTO contacts (user_id, full_name, phone, email, company, job_title, source, consent)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(owner_id)
    .bind(&draft.full_name)
    .bind(&draft.phone)
    .bind(&draft.email)
    .bind(&draft.company)
    .bind(&draft.job_title)
    .bind(draft.source.as_str())
    .bind(draft.consent.as_str())
    .fetch_one(executor)
    .await
}

/// Ingest a batch of records for `owner_id`.
///
/// Size limits are checked before the transaction opens. Records are
/// processed strictly in input order so later records observe contacts
/// created by earlier ones. Each bucket preserves first-seen order, and
/// `created + duplicates + errors` always partition the input on normal
/// completion.
pub async fn ingest_batch(
    pool: &DbPool,
    owner_id: Uuid,
    records: Vec<IncomingContact>,
) -> Result<BatchOutcome, AppError> {
    if let Some(message) = batch_size_error(records.len()) {
        return Err(AppError::InvalidRequest(message));
    }

    // Candidate keys for the two bulk prefilter lookups.
    let mut phone_patterns = Vec::new();
    let mut emails = Vec::new();
    for record in &records {
        let (phone_key, email_key) = comparison_keys(record);
        if let Some(key) = phone_key {
            let tail_start = key.len().saturating_sub(9);
            phone_patterns.push(format!("%{}%", &key[tail_start..]));
        }
        if let Some(key) = email_key {
            emails.push(key);
        }
    }

    let mut tx = pool.begin().await?;

    // Two bulk lookups instead of one query per record. The prefilter is
    // loose; PersistedIndex re-normalizes stored values for exact keys.
    let mut candidates = Vec::new();
    if !phone_patterns.is_empty() {
        candidates.extend(
            sqlx::query_as::<_, Contact>(
                "SELECT * FROM contacts WHERE user_id = $1 AND phone LIKE ANY($2)",
            )
            .bind(owner_id)
            .bind(&phone_patterns)
            .fetch_all(&mut *tx)
            .await?,
        );
    }
    if !emails.is_empty() {
        candidates.extend(
            sqlx::query_as::<_, Contact>(
                "SELECT * FROM contacts WHERE user_id = $1 AND lower(email) = ANY($2)",
            )
            .bind(owner_id)
            .bind(&emails)
            .fetch_all(&mut *tx)
            .await?,
        );
    }
    let persisted = PersistedIndex::index(candidates);

    let mut created: Vec<Contact> = Vec::new();
    let mut duplicates: Vec<DuplicateEntry> = Vec::new();
    let mut errors: Vec<ErrorEntry> = Vec::new();
    let mut ledger = BatchLedger::default();

    for input in records {
        match classify(&input, &persisted, &ledger, IngestOrigin::Direct) {
            Decision::DuplicateOfPersisted(existing) => {
                duplicates.push(DuplicateEntry {
                    input,
                    existing: existing.into(),
                });
            }
            Decision::DuplicateInBatch(index) => {
                duplicates.push(DuplicateEntry {
                    input,
                    existing: created[index].clone().into(),
                });
            }
            Decision::Reject(message) => {
                errors.push(ErrorEntry { input, message });
            }
            Decision::Create(draft) => {
                // A storage error here propagates and rolls back the whole
                // batch when `tx` drops.
                let contact = insert_contact(&mut *tx, owner_id, &draft).await?;
                let (phone_key, email_key) = comparison_keys(&input);
                ledger.register(phone_key, email_key, created.len());
                created.push(contact);
            }
        }
    }

    tx.commit().await?;

    tracing::info!(
        owner = %owner_id,
        created = created.len(),
        duplicates = duplicates.len(),
        errors = errors.len(),
        "batch ingestion committed"
    );

    Ok(BatchOutcome {
        created: created.into_iter().map(Into::into).collect(),
        duplicates,
        errors,
    })
}

/// Create a single contact for `owner_id`.
///
/// On a duplicate hit nothing is written and the conflict carries the
/// existing record. The check-then-insert pair is not locked against other
/// requests: two concurrent creates with the same phone can both pass the
/// matcher, and no storage constraint backs the uniqueness invariant.
pub async fn create_contact(
    pool: &DbPool,
    owner_id: Uuid,
    input: IncomingContact,
    origin: IngestOrigin,
) -> Result<Contact, AppError> {
    let draft = validate(&input, origin).map_err(AppError::InvalidRequest)?;

    if let Some(existing) =
        dedup::find_duplicate(pool, owner_id, &draft.phone, draft.email.as_deref(), None).await?
    {
        return Err(AppError::DuplicateContact(Box::new(existing.into())));
    }

    Ok(insert_contact(pool, owner_id, &draft).await?)
}

/// Update a contact in place, re-running validation and duplicate matching
/// so the per-owner uniqueness invariant survives edits. The row being
/// updated is excluded from matching so it cannot collide with itself.
pub async fn update_contact(
    pool: &DbPool,
    owner_id: Uuid,
    contact_id: Uuid,
    input: IncomingContact,
) -> Result<Contact, AppError> {
    let draft = validate(&input, IngestOrigin::Direct).map_err(AppError::InvalidRequest)?;

    if let Some(existing) = dedup::find_duplicate(
        pool,
        owner_id,
        &draft.phone,
        draft.email.as_deref(),
        Some(contact_id),
    )
    .await?
    {
        return Err(AppError::DuplicateContact(Box::new(existing.into())));
    }

    sqlx::query_as::<_, Contact>(
        r#"
        UPDATE contacts
        SET full_name = $3, phone = $4, email = $5, company = $6,
            job_title = $7, source = $8, consent = $9, updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(contact_id)
    .bind(owner_id)
    .bind(&draft.full_name)
    .bind(&draft.phone)
    .bind(&draft.email)
    .bind(&draft.company)
    .bind(&draft.job_title)
    .bind(draft.source.as_str())
    .bind(draft.consent.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::ContactNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn input(full_name: &str, phone_raw: &str) -> IncomingContact {
        IncomingContact {
            full_name: Some(full_name.to_string()),
            phone: Some(phone_raw.to_string()),
            ..Default::default()
        }
    }

    fn persisted_contact(phone_raw: &str, email: Option<&str>) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            full_name: "Existing".to_string(),
            phone: phone_raw.to_string(),
            email: email.map(str::to_string),
            company: None,
            job_title: None,
            source: Source::Manual,
            consent: Consent::Unknown,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_and_oversized_batches_are_rejected_before_processing() {
        let empty = batch_size_error(0).unwrap();
        assert!(empty.contains("contacts"), "{empty}");

        let over = batch_size_error(MAX_BATCH_SIZE + 1).unwrap();
        assert!(over.contains("contacts"), "{over}");
        assert!(over.contains("100"), "{over}");

        assert_eq!(batch_size_error(1), None);
        assert_eq!(batch_size_error(MAX_BATCH_SIZE), None);
    }

    #[test]
    fn validate_requires_full_name_and_phone() {
        let missing_name = IncomingContact {
            phone: Some("081234567890".to_string()),
            ..Default::default()
        };
        assert_eq!(
            validate(&missing_name, IngestOrigin::Direct).unwrap_err(),
            "full_name is required"
        );

        let blank_name = input("   ", "081234567890");
        assert_eq!(
            validate(&blank_name, IngestOrigin::Direct).unwrap_err(),
            "full_name is required"
        );

        let missing_phone = IncomingContact {
            full_name: Some("Ani".to_string()),
            ..Default::default()
        };
        assert_eq!(
            validate(&missing_phone, IngestOrigin::Direct).unwrap_err(),
            "phone is required"
        );
    }

    #[test]
    fn validate_canonicalizes_phone_and_applies_defaults() {
        let draft = validate(&input("Ani", "0812-3456-7890"), IngestOrigin::Direct).unwrap();
        assert_eq!(draft.phone, "+6281234567890");
        assert_eq!(draft.source, Source::Manual);
        assert_eq!(draft.consent, Consent::Unknown);
        assert_eq!(draft.email, None);
    }

    #[test]
    fn validate_rejects_unknown_source_and_consent_tags() {
        let mut record = input("Ani", "081234567890");
        record.source = Some("api".to_string());
        let err = validate(&record, IngestOrigin::Direct).unwrap_err();
        assert!(err.contains("source"), "{err}");

        let mut record = input("Ani", "081234567890");
        record.consent = Some("maybe".to_string());
        let err = validate(&record, IngestOrigin::Direct).unwrap_err();
        assert!(err.contains("consent"), "{err}");
    }

    #[test]
    fn validate_rejects_malformed_email() {
        for bad in ["no-at-sign", "a@b", "a @b.com", "@b.com", "a@", "a@.com"] {
            let mut record = input("Ani", "081234567890");
            record.email = Some(bad.to_string());
            assert!(
                validate(&record, IngestOrigin::Direct).is_err(),
                "accepted {bad:?}"
            );
        }
        let mut record = input("Ani", "081234567890");
        record.email = Some("ani@example.com".to_string());
        assert_eq!(
            validate(&record, IngestOrigin::Direct).unwrap().email.as_deref(),
            Some("ani@example.com")
        );
    }

    #[test]
    fn public_form_origin_forces_source() {
        let mut record = input("Ani", "081234567890");
        record.source = Some("import".to_string());
        let draft = validate(&record, IngestOrigin::PublicForm).unwrap();
        assert_eq!(draft.source, Source::Form);
    }

    #[test]
    fn classify_flags_cross_format_persisted_duplicate() {
        // Stored canonical, submitted local-format: the unified strategy
        // catches it in the batch path too.
        let persisted = PersistedIndex::index(vec![persisted_contact("+6281234567890", None)]);
        let ledger = BatchLedger::default();
        let record = input("Ani", "081234567890");
        match classify(&record, &persisted, &ledger, IngestOrigin::Direct) {
            Decision::DuplicateOfPersisted(existing) => {
                assert_eq!(existing.phone, "+6281234567890");
            }
            other => panic!("expected persisted duplicate, got {other:?}"),
        }
    }

    #[test]
    fn classify_flags_batch_local_duplicate_at_any_distance() {
        let persisted = PersistedIndex::default();
        let mut ledger = BatchLedger::default();
        // Record 0 was created and registered under index 0.
        let first = comparison_keys(&input("Ani", "081234567890"));
        ledger.register(first.0, first.1, 0);

        // Several unrelated creations in between.
        let second = comparison_keys(&input("Budi", "081111111111"));
        ledger.register(second.0, second.1, 1);

        // A later record repeating record 0's phone in another format.
        let repeat = input("Ani W.", "+62 812-3456-7890");
        match classify(&repeat, &persisted, &ledger, IngestOrigin::Direct) {
            Decision::DuplicateInBatch(index) => assert_eq!(index, 0),
            other => panic!("expected in-batch duplicate, got {other:?}"),
        }
    }

    #[test]
    fn classify_prefers_persisted_phone_over_batch_email() {
        let persisted = PersistedIndex::index(vec![persisted_contact(
            "+6281234567890",
            Some("old@y.com"),
        )]);
        let mut ledger = BatchLedger::default();
        ledger.register(None, Some("x@y.com".to_string()), 0);

        let mut record = input("Ani", "081234567890");
        record.email = Some("x@y.com".to_string());
        match classify(&record, &persisted, &ledger, IngestOrigin::Direct) {
            Decision::DuplicateOfPersisted(_) => {}
            other => panic!("expected persisted duplicate, got {other:?}"),
        }
    }

    #[test]
    fn classify_rejects_invalid_non_duplicate_record() {
        let persisted = PersistedIndex::default();
        let ledger = BatchLedger::default();
        let record = input("", "081234567890");
        match classify(&record, &persisted, &ledger, IngestOrigin::Direct) {
            Decision::Reject(message) => assert_eq!(message, "full_name is required"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn classify_creates_fresh_valid_record() {
        let persisted = PersistedIndex::index(vec![persisted_contact("+6289999999999", None)]);
        let ledger = BatchLedger::default();
        let record = input("Ani", "081234567890");
        match classify(&record, &persisted, &ledger, IngestOrigin::Direct) {
            Decision::Create(draft) => assert_eq!(draft.phone, "+6281234567890"),
            other => panic!("expected creation, got {other:?}"),
        }
    }

    #[test]
    fn persisted_index_keys_on_normalized_comparison_form() {
        // Legacy row stored without normalization.
        let persisted = PersistedIndex::index(vec![persisted_contact("081234567890", None)]);
        assert!(persisted.by_phone.contains_key("6281234567890"));
    }

    #[test]
    fn ledger_phone_lookup_wins_over_email() {
        let mut ledger = BatchLedger::default();
        ledger.register(Some("6281234567890".to_string()), None, 3);
        ledger.register(None, Some("x@y.com".to_string()), 7);
        assert_eq!(
            ledger.lookup(Some("6281234567890"), Some("x@y.com")),
            Some(3)
        );
        assert_eq!(ledger.lookup(None, Some("x@y.com")), Some(7));
        assert_eq!(ledger.lookup(Some("7000"), None), None);
    }
}
