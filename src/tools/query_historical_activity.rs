//! Historical-activity query tool
//!
//! Covers long-horizon and analytic questions via CloudTrail Lake. Queries
//! are submitted asynchronously and polled up to a wall-clock deadline; a
//! deadline hit returns whatever was fetched with `timed_out` set rather than
//! failing, so the caller can narrow the range and retry.

use super::params::parse_activity_query;
use super::{error_payload, response_payload, Tool, ToolError};
use crate::engine::router::QueryRouter;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct QueryHistoricalActivityTool {
    router: Arc<QueryRouter>,
}

impl QueryHistoricalActivityTool {
    pub fn new(router: Arc<QueryRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Tool for QueryHistoricalActivityTool {
    fn name(&self) -> &str {
        "query_historical_activity"
    }

    fn description(&self) -> &str {
        "Query AWS account activity over long horizons (beyond the 90-day event \
         history) via CloudTrail Lake. Supports the same filters as \
         lookup_recent_activity plus free-text search. Queries run asynchronously; \
         if the deadline is reached the response carries timed_out=true and any \
         events fetched so far. Echo back the continuation_token to resume without \
         re-running the query."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "start_time": {
                    "type": "string",
                    "description": "Start of the time range (default: 1 day ago)",
                    "examples": ["2022-01-01T00:00:00Z", "2022-01-01"]
                },
                "end_time": {
                    "type": "string",
                    "description": "End of the time range (default: now)",
                    "examples": ["2022-06-30T23:59:59Z", "now"]
                },
                "event_name": {
                    "type": "string",
                    "description": "Filter by API operation name"
                },
                "actor": {
                    "type": "string",
                    "description": "Filter by the IAM user or role that made the call"
                },
                "resource": {
                    "type": "string",
                    "description": "Filter by affected resource name or ARN fragment"
                },
                "free_text": {
                    "type": "string",
                    "description": "Free-text search across event name, source, and actor ARN"
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
                    timed_out = response.timed_out,
                    truncated = response.truncated,
                    "query_historical_activity completed"
                );
                response_payload(&response)
            }
            Err(error) => Ok(error_payload(&error)),
        }
    }
}
