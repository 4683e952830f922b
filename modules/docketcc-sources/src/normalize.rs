//! ECFS responses come in several shapes depending on endpoint and API
//! version. Everything here maps them onto the canonical `Filing`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use docketcc_common::{Filing, FilingDocument};
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, SourceError};

pub const FILING_URL_BASE: &str = "https://www.fcc.gov/ecfs/search/search-filings/filing";

/// Normalize a whole response body. Records that can't be identified are
/// skipped with a warning rather than failing the docket.
pub fn normalize_response(docket_number: &str, body: &Value) -> Result<Vec<Filing>> {
    let records = match body {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("filings").or_else(|| map.get("filing")) {
            Some(Value::Array(items)) => items.as_slice(),
            Some(Value::Null) | None => &[],
            Some(other) => {
                return Err(SourceError::Decode(format!(
                    "expected filings array, got {}",
                    type_name(other)
                )))
            }
        },
        Value::Null => &[],
        other => {
            return Err(SourceError::Decode(format!(
                "expected object or array, got {}",
                type_name(other)
            )))
        }
    };

    let filings = records
        .iter()
        .filter_map(|record| {
            let filing = normalize_filing(docket_number, record);
            if filing.is_none() {
                warn!(docket = %docket_number, "Skipping filing record without id or date");
            }
            filing
        })
        .collect();

    Ok(filings)
}

/// Normalize one filing record. Returns `None` when the record has no
/// usable id or received date.
pub fn normalize_filing(docket_number: &str, record: &Value) -> Option<Filing> {
    let id = string_field(record, "id_submission").or_else(|| string_field(record, "id"))?;
    let date_received = date_field(record, "date_received")
        .or_else(|| date_field(record, "date_disseminated"))?;

    let author = author(record);
    let filing_type = filing_type(record);
    let title = string_field(record, "title")
        .or_else(|| string_field(record, "brief_comment_summary"))
        .unwrap_or_else(|| format!("{filing_type} from {author}"));

    // A filing can span several proceedings; it belongs to the docket it was
    // fetched for.
    Some(Filing {
        filing_url: format!("{FILING_URL_BASE}/{id}"),
        id,
        docket_number: docket_number.to_string(),
        title,
        author,
        filing_type,
        date_received,
        documents: documents(record),
        raw_data: record.clone(),
    })
}

fn author(record: &Value) -> String {
    names(record, "filers")
        .or_else(|| names(record, "lawfirms"))
        .unwrap_or_else(|| "Unknown filer".to_string())
}

fn names(record: &Value, key: &str) -> Option<String> {
    let names: Vec<String> = record
        .get(key)?
        .as_array()?
        .iter()
        .filter_map(|entry| string_field(entry, "name"))
        .collect();

    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

fn filing_type(record: &Value) -> String {
    let submission = record.get("submissiontype");
    submission
        .and_then(|s| string_field(s, "description"))
        .or_else(|| submission.and_then(|s| string_field(s, "short")))
        .or_else(|| submission.and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "Filing".to_string())
}

fn documents(record: &Value) -> Vec<FilingDocument> {
    let Some(items) = record.get("documents").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|doc| {
            let url = string_field(doc, "src").or_else(|| string_field(doc, "url"))?;
            let filename = string_field(doc, "filename")
                .or_else(|| string_field(doc, "name"))
                .unwrap_or_else(|| filename_from_url(&url));
            Some(FilingDocument { filename, url })
        })
        .collect()
}

fn filename_from_url(url: &str) -> String {
    url.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("document")
        .to_string()
}

/// A non-empty trimmed string, also accepting numbers (ECFS ids are
/// sometimes numeric).
fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn date_field(value: &Value, key: &str) -> Option<DateTime<Utc>> {
    parse_date(value.get(key)?.as_str()?)
}

/// ECFS dates are RFC 3339 in newer responses, bare timestamps or bare
/// dates in older ones. Bare values are taken as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
