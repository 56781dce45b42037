//! Tool identifier resolution and record correlation.
//!
//! Each role's form puts the tool id under a different field (usually a
//! `group/field` path flattened into the record). Resolution tries an ordered
//! candidate list and takes the first non-blank value.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use toolscope_shared::RawRecord;

/// Resolve the tool id of `record` from the ordered `candidates`.
///
/// Returns the first candidate with a non-empty trimmed value, or an empty
/// string when none qualify.
pub fn resolve_id<S: AsRef<str>>(record: &RawRecord, candidates: &[S]) -> String {
    candidates
        .iter()
        .find_map(|field| field_text(record, field.as_ref()))
        .unwrap_or_default()
}

/// Records of `records` whose resolved id equals `tool_id` (case-sensitive).
pub fn matching<'a, S: AsRef<str>>(
    records: &'a [RawRecord],
    tool_id: &'a str,
    candidates: &'a [S],
) -> impl Iterator<Item = &'a RawRecord> + 'a {
    let tool_id = tool_id.trim();
    records
        .iter()
        .filter(move |record| !tool_id.is_empty() && resolve_id(record, candidates) == tool_id)
}

/// Keep the records of one source that belong to `tool_id`, in source order.
pub fn correlate<S: AsRef<str>>(
    records: &[RawRecord],
    tool_id: &str,
    candidates: &[S],
) -> Vec<RawRecord> {
    matching(records, tool_id, candidates).cloned().collect()
}

/// Trimmed textual value of `field`, if present and non-blank.
///
/// `field` is looked up as a flat key first, then as a `/`-separated path
/// through nested objects. Numbers are rendered as text; other JSON types are
/// not identifiers.
pub fn field_text(record: &RawRecord, field: &str) -> Option<String> {
    let text = match lookup(record, field)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn lookup<'a>(record: &'a RawRecord, field: &str) -> Option<&'a Value> {
    if let Some(value) = record.get(field) {
        return Some(value);
    }

    let mut segments = field.split('/');
    let mut current = record.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Parse a timestamp field of `record`.
pub fn field_timestamp(record: &RawRecord, field: &str) -> Option<DateTime<Utc>> {
    field_text(record, field).and_then(|text| parse_timestamp(&text))
}

/// Parse RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.f]` (taken as UTC), or a bare date.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
