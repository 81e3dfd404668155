//! Shared test support: a configurable fake CloudTrail upstream
//!
//! The fake serves deterministic datasets through both query surfaces using
//! numeric-index pagination tokens, records every upstream call for
//! call-count assertions, and can inject throttling failures and slow Lake
//! query completion.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use trailscope::engine::upstream::{
    CloudTrailApi, LakeQueryDescription, LakeQueryStatistics, LakeQueryStatus, LakeResultsPage,
    LookupPageRequest, RawLakeRow, RawRecentEvent, RecentPage,
};
use trailscope::engine::EngineConfig;

pub struct FakeCloudTrail {
    /// Dataset served through the lookup surface, already in reverse-chron order
    pub recent_events: Vec<RawRecentEvent>,
    /// Upstream page cap for lookups (service caps at 50)
    pub lookup_page_cap: usize,
    /// Dataset served through the Lake results surface
    pub lake_rows: Vec<RawLakeRow>,
    /// Upstream page cap for Lake result fetches
    pub lake_page_cap: usize,
    /// DescribeQuery reports FINISHED starting with this poll number
    pub polls_until_finished: u32,
    /// Consecutive lookup calls that fail with throttling before succeeding
    pub lookup_failures: AtomicU32,
    /// Consecutive StartQuery calls that fail with throttling
    pub start_failures: AtomicU32,
    /// Event data store summaries served by the listing call
    pub stores: Vec<serde_json::Value>,
    /// Detail calls for this ARN fail with access denied
    pub store_detail_fails_for: Option<String>,
    pub describe_calls: AtomicU32,
    pub known_queries: Mutex<Vec<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl Default for FakeCloudTrail {
    fn default() -> Self {
        Self {
            recent_events: Vec::new(),
            lookup_page_cap: 50,
            lake_rows: Vec::new(),
            lake_page_cap: 100,
            polls_until_finished: 1,
            lookup_failures: AtomicU32::new(0),
            start_failures: AtomicU32::new(0),
            stores: Vec::new(),
            store_detail_fails_for: None,
            describe_calls: AtomicU32::new(0),
            known_queries: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeCloudTrail {
    fn record(&self, operation: &str) {
        self.calls.lock().unwrap().push(operation.to_string());
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == operation)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn polls(&self) -> u32 {
        self.describe_calls.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl CloudTrailApi for FakeCloudTrail {
    async fn lookup_events(&self, request: &LookupPageRequest) -> Result<RecentPage> {
        self.record("LookupEvents");
        if Self::take_failure(&self.lookup_failures) {
            anyhow::bail!("ThrottlingException: Rate exceeded");
        }

        let start: usize = request
            .next_token
            .as_deref()
            .map(|t| t.parse().expect("fake lookup token is an index"))
            .unwrap_or(0);
        let cap = (request.page_size.max(0) as usize).min(self.lookup_page_cap);
        let end = (start + cap).min(self.recent_events.len());
        let events = self
            .recent_events
            .get(start..end)
            .unwrap_or_default()
            .to_vec();
        let next_token = (end < self.recent_events.len()).then(|| end.to_string());

        Ok(RecentPage { events, next_token })
    }

    async fn start_query(&self, _statement: &str) -> Result<String> {
        self.record("StartQuery");
        if Self::take_failure(&self.start_failures) {
            anyhow::bail!("ThrottlingException: Rate exceeded");
        }

        let mut known = self.known_queries.lock().unwrap();
        let query_id = format!("lakequery-{:04}", known.len() + 1);
        known.push(query_id.clone());
        Ok(query_id)
    }

    async fn describe_query(&self, query_id: &str) -> Result<LakeQueryDescription> {
        self.record("DescribeQuery");
        if !self
            .known_queries
            .lock()
            .unwrap()
            .iter()
            .any(|id| id == query_id)
        {
            anyhow::bail!("QueryIdNotFoundException: query id not found");
        }

        let poll = self.describe_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let status = if poll >= self.polls_until_finished {
            LakeQueryStatus::Finished
        } else if poll == 1 {
            LakeQueryStatus::Queued
        } else {
            LakeQueryStatus::Running
        };

        Ok(LakeQueryDescription {
            status,
            statistics: Some(LakeQueryStatistics {
                events_matched: Some(self.lake_rows.len() as i64),
                events_scanned: Some(self.lake_rows.len() as i64 * 10),
                bytes_scanned: Some(1_048_576),
                execution_time_ms: Some(1500),
            }),
            error_message: None,
        })
    }

    async fn get_query_results(
        &self,
        query_id: &str,
        next_token: Option<&str>,
        page_size: i32,
    ) -> Result<LakeResultsPage> {
        self.record("GetQueryResults");
        if !self
            .known_queries
            .lock()
            .unwrap()
            .iter()
            .any(|id| id == query_id)
        {
            anyhow::bail!("QueryIdNotFoundException: query id not found");
        }

        let start: usize = next_token
            .map(|t| t.parse().expect("fake lake token is an index"))
            .unwrap_or(0);
        let cap = (page_size.max(0) as usize).min(self.lake_page_cap);
        let end = (start + cap).min(self.lake_rows.len());
        let rows = self.lake_rows.get(start..end).unwrap_or_default().to_vec();
        let next_token = (end < self.lake_rows.len()).then(|| end.to_string());

        Ok(LakeResultsPage { rows, next_token })
    }

    async fn list_event_data_stores(&self) -> Result<Vec<serde_json::Value>> {
        self.record("ListEventDataStores");
        Ok(self.stores.clone())
    }

    async fn get_event_data_store(&self, arn: &str) -> Result<serde_json::Value> {
        self.record("GetEventDataStore");
        if self.store_detail_fails_for.as_deref() == Some(arn) {
            anyhow::bail!("AccessDeniedException: not authorized to get event data store");
        }
        Ok(serde_json::json!({
            "event_data_store_arn": arn,
            "advanced_event_selectors": [{"name": "management events"}],
            "organization_enabled": false,
        }))
    }
}

/// Reverse-chronological lookup dataset anchored at `newest`
pub fn make_recent_events(count: usize, newest: DateTime<Utc>) -> Vec<RawRecentEvent> {
    (0..count)
        .map(|i| RawRecentEvent {
            event_id: format!("recent-{:04}", i),
            event_name: "ConsoleLogin".to_string(),
            event_time: Some(newest - Duration::minutes(i as i64)),
            event_source: "signin.amazonaws.com".to_string(),
            username: "alice".to_string(),
            resources: vec![],
            cloud_trail_event: Some(
                r#"{"sourceIPAddress":"198.51.100.1","awsRegion":"us-east-1"}"#.to_string(),
            ),
            access_key_id: None,
            read_only: Some("true".to_string()),
        })
        .collect()
}

/// Lake dataset with descending event times
pub fn make_lake_rows(count: usize) -> Vec<RawLakeRow> {
    (0..count)
        .map(|i| {
            RawLakeRow(vec![
                ("eventid".to_string(), format!("lake-{:04}", i)),
                (
                    "eventtime".to_string(),
                    format!("2022-03-01 12:{:02}:00.000", 59 - (i % 60)),
                ),
                ("eventname".to_string(), "PutObject".to_string()),
                ("eventsource".to_string(), "s3.amazonaws.com".to_string()),
                (
                    "useridentity.arn".to_string(),
                    "arn:aws:iam::123456789012:user/alice".to_string(),
                ),
                ("awsregion".to_string(), "us-east-1".to_string()),
                ("readonly".to_string(), "false".to_string()),
            ])
        })
        .collect()
}

/// Engine config for tests: an event data store configured and a rate bucket
/// generous enough not to interact with scenario timing
pub fn test_config() -> EngineConfig {
    EngineConfig::new()
        .with_event_data_store("eds-test")
        .with_rate_limit(1000.0, 1000.0)
}
