//! Recent-activity lookup tool
//!
//! Covers point-in-time questions over the 90-day event history. The router
//! still owns mode selection: a query outside the recent window, or one that
//! needs analytic filtering, transparently runs on the Lake surface instead.

use super::params::parse_activity_query;
use super::{error_payload, response_payload, Tool, ToolError};
use crate::engine::router::QueryRouter;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct LookupRecentActivityTool {
    router: Arc<QueryRouter>,
}

impl LookupRecentActivityTool {
    pub fn new(router: Arc<QueryRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Tool for LookupRecentActivityTool {
    fn name(&self) -> &str {
        "lookup_recent_activity"
    }

    fn description(&self) -> &str {
        "Look up AWS account activity events from CloudTrail's 90-day event history. \
         Supports filtering by event name, actor (username), or resource name, plus a \
         time range. Time formats: ISO 8601 (2024-01-01T00:00:00Z), YYYY-MM-DD HH:MM:SS, \
         YYYY-MM-DD, 'now', or relative times like '7 days ago', '1 hour ago'. \
         Defaults to the last 24 hours. Responses are size-bounded; echo back the \
         continuation_token to fetch more."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "start_time": {
                    "type": "string",
                    "description": "Start of the time range (default: 1 day ago)",
                    "examples": ["2024-01-01T00:00:00Z", "2024-01-01", "7 days ago"]
                },
                "end_time": {
                    "type": "string",
                    "description": "End of the time range (default: now)",
                    "examples": ["2024-01-07T23:59:59Z", "1 hour ago", "now"]
                },
                "event_name": {
                    "type": "string",
                    "description": "Filter by API operation name",
                    "examples": ["ConsoleLogin", "RunInstances", "DeleteBucket"]
                },
                "actor": {
                    "type": "string",
                    "description": "Filter by the IAM user or role that made the call"
                },
                "resource": {
                    "type": "string",
                    "description": "Filter by affected resource name or identifier",
                    "examples": ["i-1234567890abcdef0", "my-bucket"]
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum events to return (default: 50)",
                    "minimum": 1,
                    "maximum": 1000
                },
                "continuation_token": {
                    "type": "string",
                    "description": "Token from a prior response to resume pagination"
                }
            }
        })
    }

    async fn execute(
        &self,
        parameters: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ToolError> {
        let params = parameters.unwrap_or_else(|| serde_json::json!({}));
        let query = parse_activity_query(&params, self.router.config())?;

        match self.router.execute(query).await {
            Ok(response) => {
                info!(
                    events = response.events.len(),
                    truncated = response.truncated,
                    "lookup_recent_activity completed"
                );
                response_payload(&response)
            }
            Err(error) => Ok(error_payload(&error)),
        }
    }
}
