//! Event data store listing tool

use super::params::optional_string;
use super::{Tool, ToolError};
use crate::engine::router::QueryRouter;
use async_trait::async_trait;
use std::sync::Arc;

pub struct ListEventDataStoresTool {
    router: Arc<QueryRouter>,
}

impl ListEventDataStoresTool {
    pub fn new(router: Arc<QueryRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Tool for ListEventDataStoresTool {
    fn name(&self) -> &str {
        "list_event_data_stores"
    }

    fn description(&self) -> &str {
        "List the CloudTrail Lake event data stores available to this account, \
         with their status, retention, and (optionally) advanced event selectors. \
         Historical activity queries run against one of these stores."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "include_details": {
                    "type": "boolean",
                    "description": "Fetch per-store event selector detail (default: true)"
                }
            }
        })
    }

    async fn execute(
        &self,
        parameters: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ToolError> {
        let params = parameters.unwrap_or_else(|| serde_json::json!({}));

        // Accept both a boolean and its string form
        let include_details = match params.get("include_details") {
            None | Some(serde_json::Value::Null) => true,
            Some(serde_json::Value::Bool(b)) => *b,
            Some(_) => optional_string(&params, "include_details")?
                .map(|s| s == "true")
                .unwrap_or(true),
        };

        match self.router.list_event_data_stores(include_details).await {
            Ok(listing) => Ok(serde_json::json!({
                "event_data_stores": listing.stores,
                "summary": {
                    "total_stores": listing.total_stores,
                    "enabled_stores": listing.enabled_stores,
                    "multi_region_stores": listing.multi_region_stores,
                    "organization_stores": listing.organization_stores,
                },
            })),
            Err(error) => Ok(serde_json::json!({
                "event_data_stores": [],
                "error": {
                    "kind": error.kind(),
                    "message": error.to_string(),
                },
            })),
        }
    }
}
