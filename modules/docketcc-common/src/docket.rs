use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DocketError;

static RE_DOCKET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}-\d{2,3}$").unwrap());

static RE_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Consecutive poll failures at which a docket is reported as broken.
pub const ERROR_THRESHOLD: i64 = 3;

/// A docket not checked within this window is reported as stale.
pub const STALE_AFTER_HOURS: i64 = 4;

/// Validate an FCC docket number (`NN-NN` or `NN-NNN`). Surrounding
/// whitespace is trimmed; the trimmed form is returned.
pub fn validate_docket_number(raw: &str) -> Result<String, DocketError> {
    let trimmed = raw.trim();
    if RE_DOCKET.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(DocketError::InvalidDocketNumber(raw.to_string()))
    }
}

/// Canonical form for email identity: trimmed and lower-cased.
pub fn normalize_email(raw: &str) -> Result<String, DocketError> {
    let email = raw.trim().to_lowercase();
    if RE_EMAIL.is_match(&email) {
        Ok(email)
    } else {
        Err(DocketError::InvalidEmail(raw.to_string()))
    }
}

/// Monitoring health of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocketHealth {
    Healthy,
    Warning,
    Error,
}

/// Derive health from poll bookkeeping. Pure; `now` is supplied by the caller.
pub fn docket_health(
    error_count: i64,
    last_checked: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DocketHealth {
    if error_count >= ERROR_THRESHOLD {
        return DocketHealth::Error;
    }

    let stale = match last_checked {
        Some(checked) => now - checked > Duration::hours(STALE_AFTER_HOURS),
        None => true,
    };

    if stale || error_count > 0 {
        DocketHealth::Warning
    } else {
        DocketHealth::Healthy
    }
}
