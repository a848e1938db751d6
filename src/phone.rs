//! Phone number normalization.
//!
//! Contacts arrive with phones in every format users can type: local
//! Indonesian numbers (`0812-3456-7890`), country-coded numbers without the
//! plus (`6281234567890`), already-canonical E.164-style strings, and
//! everything in between. This module maps all of them onto one canonical
//! `+`-prefixed form so the duplicate matcher can compare apples to apples.
//!
//! Both functions are pure: same input, same output, no side effects.

/// Normalize a raw phone string into canonical `+`-prefixed form.
///
/// Rules, applied in order:
///
/// 1. Every character except digits and one leading `+` is stripped.
/// 2. Nothing left after stripping returns `None`.
/// 3. A `+`-prefixed string is already canonical and returned as stripped.
/// 4. 10-13 digits behind a single leading `0` are taken as Indonesian
///    local format; the `0` becomes `+62`.
/// 5. Any other digit string is assumed to be a country-coded number whose
///    caller dropped the `+` (this covers bare `62…` forms) and gets the
///    `+` prefixed back.
///
/// The output always starts with `+`, which makes the function idempotent:
/// `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> Option<String> {
    let stripped = strip(raw);
    let digits = stripped.strip_prefix('+').unwrap_or(&stripped);

    if digits.is_empty() {
        return None;
    }
    if stripped.starts_with('+') {
        return Some(stripped);
    }
    // Local format heuristic: a single leading zero in the 10-13 digit
    // window. Double-zero international prefixes fall through.
    if digits.starts_with('0') && !digits.starts_with("00") && (10..=13).contains(&digits.len()) {
        return Some(format!("+62{}", &digits[1..]));
    }
    Some(format!("+{digits}"))
}

/// Normalize for matching: canonical form with the single leading `+`
/// stripped.
///
/// Legacy rows were stored before normalization existed and may hold bare
/// digit strings; comparing without the separator lets those still match.
pub fn normalize_for_comparison(raw: &str) -> Option<String> {
    let mut normalized = normalize(raw)?;
    if normalized.starts_with('+') {
        normalized.remove(0);
    }
    Some(normalized)
}

/// Keep digits, plus a `+` only when nothing has been kept before it.
fn strip(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_digit() || (c == '+' && out.is_empty()) {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_zero_prefix_becomes_country_code() {
        assert_eq!(
            normalize("081234567890").as_deref(),
            Some("+6281234567890")
        );
    }

    #[test]
    fn bare_country_code_gains_plus() {
        assert_eq!(
            normalize("6281234567890").as_deref(),
            Some("+6281234567890")
        );
    }

    #[test]
    fn canonical_input_is_unchanged() {
        assert_eq!(
            normalize("+6281234567890").as_deref(),
            Some("+6281234567890")
        );
    }

    #[test]
    fn separators_and_spaces_are_stripped() {
        assert_eq!(
            normalize("0812-3456-7890").as_deref(),
            Some("+6281234567890")
        );
        assert_eq!(
            normalize("+62 (812) 3456 7890").as_deref(),
            Some("+6281234567890")
        );
    }

    #[test]
    fn plus_is_only_kept_in_leading_position() {
        assert_eq!(normalize("62+81234567890").as_deref(), Some("+6281234567890"));
    }

    #[test]
    fn empty_and_digitless_input_is_none() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("   "), None);
        assert_eq!(normalize("abc"), None);
        assert_eq!(normalize("+"), None);
    }

    #[test]
    fn foreign_country_codes_pass_through() {
        assert_eq!(normalize("442071838750").as_deref(), Some("+442071838750"));
        assert_eq!(normalize("+14155550123").as_deref(), Some("+14155550123"));
    }

    #[test]
    fn zero_prefix_outside_local_window_is_not_rewritten() {
        // Nine digits is below the local-format window.
        assert_eq!(normalize("081234567").as_deref(), Some("+081234567"));
        // Double zero is an international dial prefix, not a local number.
        assert_eq!(
            normalize("0062812345678").as_deref(),
            Some("+0062812345678")
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            "081234567890",
            "6281234567890",
            "+62 812-3456-7890",
            "0812345678901",
            "442071838750",
            "081234567",
        ];
        for raw in inputs {
            let once = normalize(raw).unwrap();
            assert_eq!(normalize(&once), Some(once.clone()), "input {raw:?}");
        }
    }

    #[test]
    fn comparison_form_drops_exactly_one_plus() {
        assert_eq!(
            normalize_for_comparison("081234567890").as_deref(),
            Some("6281234567890")
        );
        assert_eq!(
            normalize_for_comparison("+6281234567890").as_deref(),
            Some("6281234567890")
        );
        assert_eq!(normalize_for_comparison(""), None);
    }

    #[test]
    fn comparison_form_matches_normalize_output() {
        for raw in ["081234567890", "6281234567890", "+6281234567890"] {
            let canonical = normalize(raw).unwrap();
            let comparison = normalize_for_comparison(raw).unwrap();
            assert_eq!(format!("+{comparison}"), canonical);
        }
    }
}
