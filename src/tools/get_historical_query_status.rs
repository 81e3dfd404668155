//! Status check for a previously submitted Lake query

use super::params::required_string;
use super::{Tool, ToolError};
use crate::engine::router::QueryRouter;
use async_trait::async_trait;
use std::sync::Arc;

pub struct GetHistoricalQueryStatusTool {
    router: Arc<QueryRouter>,
}

impl GetHistoricalQueryStatusTool {
    pub fn new(router: Arc<QueryRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Tool for GetHistoricalQueryStatusTool {
    fn name(&self) -> &str {
        "get_historical_query_status"
    }

    fn description(&self) -> &str {
        "Check the status of a previously submitted historical activity query. \
         Returns the upstream status (QUEUED, RUNNING, FINISHED, FAILED, CANCELLED, \
         TIMED_OUT), execution statistics, and the error message if it failed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query_id": {
                    "type": "string",
                    "description": "The id of the historical query to check"
                }
            },
            "required": ["query_id"]
        })
    }

    async fn execute(
        &self,
        parameters: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ToolError> {
        let params = parameters.unwrap_or_else(|| serde_json::json!({}));
        let query_id = required_string(&params, "query_id")?;

        match self.router.historical_status(&query_id).await {
            Ok(description) => {
                let statistics = description.statistics.map(|s| {
                    serde_json::json!({
                        "events_matched": s.events_matched,
                        "events_scanned": s.events_scanned,
                        "bytes_scanned": s.bytes_scanned,
                        "execution_time_ms": s.execution_time_ms,
                    })
                });
                Ok(serde_json::json!({
                    "query_id": query_id,
                    "status": description.status.as_str(),
                    "statistics": statistics,
                    "error_message": description.error_message,
                }))
            }
            Err(error) => Ok(serde_json::json!({
                "query_id": query_id,
                "error": {
                    "kind": error.kind(),
                    "message": error.to_string(),
                },
            })),
        }
    }
}
