//! Event data store discovery
//!
//! Historical queries run against a Lake event data store; this module lists
//! the stores available to the account so callers can pick one. Detail
//! enrichment is best-effort: a failed per-store detail call degrades to the
//! undetailed summary instead of failing the listing.

use super::error::QueryError;
use super::rate_limit::RateLimiter;
use super::retry::RetryExecutor;
use super::upstream::CloudTrailApi;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// One event data store, as reported upstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDataStoreSummary {
    pub name: Option<String>,
    pub arn: Option<String>,
    pub status: Option<String>,
    pub retention_days: Option<i64>,
    pub multi_region_enabled: Option<bool>,
    pub organization_enabled: Option<bool>,
    /// Present only when detail enrichment succeeded
    pub advanced_event_selectors: Option<Value>,
}

/// Listing of available stores with aggregate counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataStoreListing {
    pub stores: Vec<EventDataStoreSummary>,
    pub total_stores: usize,
    pub enabled_stores: usize,
    pub multi_region_stores: usize,
    pub organization_stores: usize,
}

pub struct DataStoreCatalog {
    api: Arc<dyn CloudTrailApi>,
    limiter: Arc<RateLimiter>,
    retry: RetryExecutor,
}

impl DataStoreCatalog {
    pub fn new(
        api: Arc<dyn CloudTrailApi>,
        limiter: Arc<RateLimiter>,
        retry: RetryExecutor,
    ) -> Self {
        Self {
            api,
            limiter,
            retry,
        }
    }

    /// List stores, optionally enriched with per-store detail
    pub async fn list(&self, include_details: bool) -> Result<DataStoreListing, QueryError> {
        self.limiter.acquire().await;
        let raw = self
            .retry
            .run("ListEventDataStores", || self.api.list_event_data_stores())
            .await?;

        let mut stores: Vec<EventDataStoreSummary> =
            raw.iter().map(summary_from_json).collect();

        if include_details {
            let details = {
                let mut futures = FuturesUnordered::new();
                for (index, store) in stores.iter().enumerate() {
                    let Some(arn) = store.arn.clone() else {
                        continue;
                    };
                    let api = self.api.clone();
                    let limiter = self.limiter.clone();
                    let retry = self.retry.clone();
                    futures.push(async move {
                        limiter.acquire().await;
                        let result = retry
                            .run("GetEventDataStore", || api.get_event_data_store(&arn))
                            .await;
                        (index, arn, result)
                    });
                }

                let mut collected = Vec::new();
                while let Some((index, arn, result)) = futures.next().await {
                    match result {
                        Ok(detail) => collected.push((index, detail)),
                        Err(error) => {
                            warn!(
                                arn = arn.as_str(),
                                "could not get detail for event data store: {}", error
                            );
                        }
                    }
                }
                collected
            };

            for (index, detail) in details {
                if let Some(store) = stores.get_mut(index) {
                    merge_detail(store, &detail);
                }
            }
        }

        let enabled_stores = stores
            .iter()
            .filter(|s| s.status.as_deref() == Some("ENABLED"))
            .count();
        let multi_region_stores = stores
            .iter()
            .filter(|s| s.multi_region_enabled == Some(true))
            .count();
        let organization_stores = stores
            .iter()
            .filter(|s| s.organization_enabled == Some(true))
            .count();

        Ok(DataStoreListing {
            total_stores: stores.len(),
            enabled_stores,
            multi_region_stores,
            organization_stores,
            stores,
        })
    }
}

fn summary_from_json(value: &Value) -> EventDataStoreSummary {
    EventDataStoreSummary {
        name: string_field(value, "name"),
        arn: string_field(value, "event_data_store_arn"),
        status: string_field(value, "status"),
        retention_days: value.get("retention_period").and_then(|v| v.as_i64()),
        multi_region_enabled: value.get("multi_region_enabled").and_then(|v| v.as_bool()),
        organization_enabled: value.get("organization_enabled").and_then(|v| v.as_bool()),
        advanced_event_selectors: None,
    }
}

fn merge_detail(store: &mut EventDataStoreSummary, detail: &Value) {
    if let Some(selectors) = detail.get("advanced_event_selectors") {
        if !selectors.is_null() {
            store.advanced_event_selectors = Some(selectors.clone());
        }
    }
    if let Some(flag) = detail.get("multi_region_enabled").and_then(|v| v.as_bool()) {
        store.multi_region_enabled = Some(flag);
    }
    if let Some(flag) = detail.get("organization_enabled").and_then(|v| v.as_bool()) {
        store.organization_enabled = Some(flag);
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_json() {
        let value = serde_json::json!({
            "name": "primary",
            "event_data_store_arn": "arn:aws:cloudtrail:us-east-1:123456789012:eventdatastore/abc",
            "status": "ENABLED",
            "retention_period": 366,
            "multi_region_enabled": true,
        });
        let summary = summary_from_json(&value);
        assert_eq!(summary.name.as_deref(), Some("primary"));
        assert_eq!(summary.status.as_deref(), Some("ENABLED"));
        assert_eq!(summary.retention_days, Some(366));
        assert_eq!(summary.multi_region_enabled, Some(true));
        assert!(summary.organization_enabled.is_none());
    }

    #[test]
    fn test_merge_detail_overrides_flags() {
        let mut store = summary_from_json(&serde_json::json!({"name": "primary"}));
        merge_detail(
            &mut store,
            &serde_json::json!({
                "advanced_event_selectors": [{"name": "management events"}],
                "organization_enabled": true,
            }),
        );
        assert!(store.advanced_event_selectors.is_some());
        assert_eq!(store.organization_enabled, Some(true));
    }
}
