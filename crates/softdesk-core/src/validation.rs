//! Input rules that need no storage access.

use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use crate::error::{SoftdeskError, SoftdeskResult};

/// Minimum age, in whole years, required to hold an account.
pub const MIN_AGE_YEARS: u32 = 15;

/// Age in completed years on `today`.
///
/// Calendar-year difference, minus one when the birthday has not yet
/// occurred this year.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let not_yet = (today.month(), today.day()) < (birth.month(), birth.day());
    today.year() - birth.year() - i32::from(not_yet)
}

pub fn validate_min_age(birth: NaiveDate, today: NaiveDate, min_age: u32) -> SoftdeskResult<()> {
    if age_on(birth, today) < min_age as i32 {
        return Err(SoftdeskError::validation(
            "date_birth",
            format!("You must be at least {min_age} years old."),
        ));
    }
    Ok(())
}

/// Lowercased domain part of an email address.
///
/// Returns `None` when the address has no `@`, an empty local part or an
/// empty domain.
pub fn email_domain(email: &str) -> Option<String> {
    let (local, domain) = email.trim().rsplit_once('@')?;
    let domain = domain.trim();
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(domain.to_ascii_lowercase())
}

/// Parse a required identifier parameter.
///
/// A missing value is reported as a validation error on `field` so that
/// it is rejected before any query runs.
pub fn require_id(field: &str, raw: Option<&str>) -> SoftdeskResult<Uuid> {
    let raw = raw
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SoftdeskError::validation(field, "This parameter is required."))?;
    Uuid::parse_str(raw)
        .map_err(|_| SoftdeskError::validation(field, format!("'{raw}' is not a valid id.")))
}

pub fn require_non_empty(field: &str, value: &str) -> SoftdeskResult<()> {
    if value.trim().is_empty() {
        return Err(SoftdeskError::validation(field, "This field may not be blank."));
    }
    Ok(())
}
