//! Result normalization
//!
//! Pure per-record mapping from both upstream shapes into the canonical
//! `ActivityEvent`. Missing optional fields become empty or absent values;
//! nothing downstream branches on which surface a record came from.

use super::types::{ActivityEvent, ResourceRef};
use super::upstream::{RawLakeRow, RawRecentEvent};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Normalize a record from the synchronous lookup surface
pub fn normalize_recent(raw: &RawRecentEvent) -> ActivityEvent {
    let payload: Option<Value> = raw
        .cloud_trail_event
        .as_deref()
        .and_then(|s| serde_json::from_str(s).ok());

    let source_ip = payload
        .as_ref()
        .and_then(|p| p.get("sourceIPAddress"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let aws_region = payload
        .as_ref()
        .and_then(|p| p.get("awsRegion"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    ActivityEvent {
        event_id: raw.event_id.clone(),
        event_time: raw.event_time,
        event_name: raw.event_name.clone(),
        event_source: raw.event_source.clone(),
        actor_identity: raw.username.clone(),
        source_ip,
        aws_region,
        resources: raw
            .resources
            .iter()
            .map(|res| ResourceRef {
                resource_type: res.resource_type.clone(),
                resource_name: res.resource_name.clone(),
            })
            .collect(),
        raw_payload: payload,
        read_only: raw.read_only.as_deref() == Some("true"),
    }
}

/// Normalize a Lake result row
pub fn normalize_lake_row(row: &RawLakeRow) -> ActivityEvent {
    let actor_identity = ["useridentity.username", "useridentity.arn", "username", "useridentity"]
        .iter()
        .find_map(|key| row.field(key).filter(|v| !v.is_empty()))
        .unwrap_or_default()
        .to_string();

    let resources = row
        .field("resources")
        .and_then(|s| serde_json::from_str::<Value>(s).ok())
        .and_then(|v| v.as_array().cloned())
        .map(|items| {
            items
                .iter()
                .map(|item| ResourceRef {
                    resource_type: item
                        .get("type")
                        .or_else(|| item.get("resourcetype"))
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                    resource_name: item
                        .get("arn")
                        .or_else(|| item.get("resourcename"))
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                })
                .collect()
        })
        .unwrap_or_default();

    let raw_payload = if row.0.is_empty() {
        None
    } else {
        let mut map = serde_json::Map::new();
        for (field, value) in &row.0 {
            map.insert(field.clone(), coerce_field_value(value));
        }
        Some(Value::Object(map))
    };

    ActivityEvent {
        event_id: row.field("eventid").unwrap_or_default().to_string(),
        event_time: row.field("eventtime").and_then(parse_lake_time),
        event_name: row.field("eventname").unwrap_or_default().to_string(),
        event_source: row.field("eventsource").unwrap_or_default().to_string(),
        actor_identity,
        source_ip: row
            .field("sourceipaddress")
            .filter(|v| !v.is_empty())
            .map(|s| s.to_string()),
        aws_region: row
            .field("awsregion")
            .filter(|v| !v.is_empty())
            .map(|s| s.to_string()),
        resources,
        raw_payload,
        read_only: matches!(coerce_field_value(row.field("readonly").unwrap_or("")), Value::Bool(true)),
    }
}

/// Parse Lake timestamp formats: RFC 3339 or `YYYY-MM-DD HH:MM:SS[.fff]`
fn parse_lake_time(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(value, format) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }
    None
}

/// Coerce a Lake field value string into a typed JSON value.
///
/// Lake returns every cell as a string; booleans, nulls, timestamps, and
/// numbers are recovered here so raw payloads carry usable types.
pub fn coerce_field_value(value: &str) -> Value {
    let lower = value.trim().to_lowercase();

    if lower == "true" || lower == "false" {
        return Value::Bool(lower == "true");
    }

    if lower == "null" || lower == "none" || lower.is_empty() {
        return Value::Null;
    }

    // ISO-ish timestamps normalize to RFC 3339 strings
    let date_shaped = value.contains('T') || value.get(..10).is_some_and(|p| p.contains('-'));
    if value.len() >= 19 && date_shaped {
        if let Some(dt) = parse_lake_time(value) {
            return Value::String(dt.to_rfc3339());
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(&value.replace('Z', "+00:00")) {
            return Value::String(dt.with_timezone(&Utc).to_rfc3339());
        }
    }

    if !value.contains('.') && !lower.contains('e') {
        if let Ok(n) = value.parse::<i64>() {
            return Value::Number(n.into());
        }
    } else if let Ok(f) = value.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }

    Value::String(value.to_string())
}
