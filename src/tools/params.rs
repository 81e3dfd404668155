//! Shared argument parsing for activity-query tools

use super::ToolError;
use crate::engine::config::EngineConfig;
use crate::engine::time_input::parse_time_input;
use crate::engine::types::ActivityQuery;
use chrono::{Duration, Utc};
use serde_json::Value;

/// Parse an `ActivityQuery` from a tool's JSON argument object.
///
/// Omitted times default to the last 24 hours; omitted `max_results` defaults
/// from config.
pub fn parse_activity_query(
    params: &Value,
    config: &EngineConfig,
) -> Result<ActivityQuery, ToolError> {
    let start_time = match optional_string(params, "start_time")? {
        Some(raw) => parse_time_input(&raw).map_err(invalid)?,
        None => Utc::now() - Duration::days(1),
    };
    let end_time = match optional_string(params, "end_time")? {
        Some(raw) => parse_time_input(&raw).map_err(invalid)?,
        None => Utc::now(),
    };

    let mut query = ActivityQuery::new(start_time, end_time)
        .with_max_results(config.default_max_results);

    if let Some(event_name) = optional_string(params, "event_name")? {
        query = query.with_event_name(event_name);
    }
    if let Some(actor) = optional_string(params, "actor")? {
        query = query.with_actor(actor);
    }
    if let Some(resource) = optional_string(params, "resource")? {
        query = query.with_resource(resource);
    }
    if let Some(free_text) = optional_string(params, "free_text")? {
        query = query.with_free_text(free_text);
    }
    if let Some(token) = optional_string(params, "continuation_token")? {
        query = query.with_continuation_token(token);
    }

    if let Some(value) = params.get("max_results") {
        let max_results = value
            .as_u64()
            .ok_or_else(|| invalid("max_results must be a positive integer"))?;
        query = query.with_max_results(max_results as usize);
    }

    Ok(query)
}

/// Fetch an optional string argument, rejecting non-string values
pub fn optional_string(params: &Value, key: &str) -> Result<Option<String>, ToolError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(invalid(format!("{} must be a string", key))),
    }
}

/// Fetch a required string argument
pub fn required_string(params: &Value, key: &str) -> Result<String, ToolError> {
    optional_string(params, key)?
        .ok_or_else(|| invalid(format!("{} parameter is required", key)))
}

fn invalid(message: impl Into<String>) -> ToolError {
    ToolError::InvalidParameters {
        message: message.into(),
    }
}
