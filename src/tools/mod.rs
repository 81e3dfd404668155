//! Tool boundary for LLM tool-calling hosts
//!
//! Each engine operation is exposed as a `Tool`: a name, a description, a
//! JSON parameters schema, and an async execute over JSON arguments. The
//! host protocol and its transport live outside this crate; it only needs to
//! hand arguments in and relay the JSON result back.
//!
//! Argument-shape problems (wrong types, unparseable times) fail as
//! `ToolError::InvalidParameters`. Engine errors come back inside the result
//! payload as a structured `{kind, message}` object, so the model calling the
//! tool can see and react to them.

pub mod get_historical_query_status;
pub mod list_event_data_stores;
pub mod lookup_recent_activity;
pub mod params;
pub mod query_historical_activity;

use crate::engine::error::QueryError;
use crate::engine::router::QueryRouter;
use crate::engine::types::ActivityResponse;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use get_historical_query_status::GetHistoricalQueryStatusTool;
pub use list_event_data_stores::ListEventDataStoresTool;
pub use lookup_recent_activity::LookupRecentActivityTool;
pub use query_historical_activity::QueryHistoricalActivityTool;

/// Tool invocation failure visible to the host protocol
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid parameters: {message}")]
    InvalidParameters { message: String },
    #[error("execution failed: {message}")]
    ExecutionFailed { message: String },
}

/// One callable tool exposed to the host
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the tool's argument object
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(
        &self,
        parameters: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ToolError>;
}

/// Serialize a successful engine response for the wire
pub(crate) fn response_payload(response: &ActivityResponse) -> Result<serde_json::Value, ToolError> {
    serde_json::to_value(response).map_err(|e| ToolError::ExecutionFailed {
        message: format!("failed to serialize response: {}", e),
    })
}

/// Engine errors travel inside the payload so the calling model sees them
pub(crate) fn error_payload(error: &QueryError) -> serde_json::Value {
    serde_json::json!({
        "events": [],
        "truncated": false,
        "timed_out": false,
        "continuation_token": null,
        "error": {
            "kind": error.kind(),
            "message": error.to_string(),
        },
    })
}

/// All tools this crate provides, bound to one router
pub fn builtin_tools(router: Arc<QueryRouter>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(LookupRecentActivityTool::new(router.clone())),
        Arc::new(QueryHistoricalActivityTool::new(router.clone())),
        Arc::new(GetHistoricalQueryStatusTool::new(router.clone())),
        Arc::new(ListEventDataStoresTool::new(router)),
    ]
}
