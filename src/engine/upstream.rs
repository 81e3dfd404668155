//! Upstream CloudTrail API boundary
//!
//! The engine talks to CloudTrail through the `CloudTrailApi` trait: one
//! method per logical upstream call, returning engine-owned raw types.
//! `SdkCloudTrail` is the production implementation over `aws-sdk-cloudtrail`;
//! tests implement the trait with fakes. Credential resolution and signing
//! are the injected `SdkConfig`'s concern.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_cloudtrail as cloudtrail;
use aws_smithy_types::DateTime as SmithyDateTime;
use chrono::{DateTime, Utc};

/// One page request against the synchronous event-history lookup
#[derive(Debug, Clone)]
pub struct LookupPageRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// At most one attribute filter; the lookup API accepts a single one
    pub filter: Option<LookupFilter>,
    pub page_size: i32,
    pub next_token: Option<String>,
}

/// Attribute filter for the lookup surface
#[derive(Debug, Clone)]
pub struct LookupFilter {
    /// One of: EventId, EventName, ReadOnly, Username, ResourceType,
    /// ResourceName, EventSource, AccessKeyId
    pub attribute_key: String,
    pub attribute_value: String,
}

/// Raw event record from the lookup surface
#[derive(Debug, Clone)]
pub struct RawRecentEvent {
    pub event_id: String,
    pub event_name: String,
    pub event_time: Option<DateTime<Utc>>,
    pub event_source: String,
    pub username: String,
    pub resources: Vec<RawEventResource>,
    /// Full CloudTrail event JSON (can be large)
    pub cloud_trail_event: Option<String>,
    pub access_key_id: Option<String>,
    pub read_only: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RawEventResource {
    pub resource_type: Option<String>,
    pub resource_name: Option<String>,
}

/// One page of lookup results, upstream order preserved
#[derive(Debug, Clone)]
pub struct RecentPage {
    pub events: Vec<RawRecentEvent>,
    pub next_token: Option<String>,
}

/// One Lake result row: field/value pairs in upstream column order
#[derive(Debug, Clone)]
pub struct RawLakeRow(pub Vec<(String, String)>);

impl RawLakeRow {
    /// Case-insensitive field lookup
    pub fn field(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// One page of Lake query results
#[derive(Debug, Clone)]
pub struct LakeResultsPage {
    pub rows: Vec<RawLakeRow>,
    pub next_token: Option<String>,
}

/// Upstream status of a Lake query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LakeQueryStatus {
    Queued,
    Running,
    Finished,
    Failed,
    Cancelled,
    TimedOut,
}

impl LakeQueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LakeQueryStatus::Queued => "QUEUED",
            LakeQueryStatus::Running => "RUNNING",
            LakeQueryStatus::Finished => "FINISHED",
            LakeQueryStatus::Failed => "FAILED",
            LakeQueryStatus::Cancelled => "CANCELLED",
            LakeQueryStatus::TimedOut => "TIMED_OUT",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, LakeQueryStatus::Queued | LakeQueryStatus::Running)
    }
}

/// Execution statistics reported for a Lake query
#[derive(Debug, Clone, Default)]
pub struct LakeQueryStatistics {
    pub events_matched: Option<i64>,
    pub events_scanned: Option<i64>,
    pub bytes_scanned: Option<i64>,
    pub execution_time_ms: Option<i64>,
}

/// Status-poll result for a Lake query
#[derive(Debug, Clone)]
pub struct LakeQueryDescription {
    pub status: LakeQueryStatus,
    pub statistics: Option<LakeQueryStatistics>,
    pub error_message: Option<String>,
}

/// The five logical upstream operations the engine depends on.
///
/// Every method is read-only upstream except `start_query`, which submits a
/// new Lake query; repeating polls and page fetches is safe.
#[async_trait]
pub trait CloudTrailApi: Send + Sync {
    /// Synchronous paginated event lookup (90-day history)
    async fn lookup_events(&self, request: &LookupPageRequest) -> Result<RecentPage>;

    /// Submit a Lake query; returns the upstream query id
    async fn start_query(&self, statement: &str) -> Result<String>;

    /// Poll a Lake query's status
    async fn describe_query(&self, query_id: &str) -> Result<LakeQueryDescription>;

    /// Fetch one page of a finished Lake query's results
    async fn get_query_results(
        &self,
        query_id: &str,
        next_token: Option<&str>,
        page_size: i32,
    ) -> Result<LakeResultsPage>;

    /// List event data stores as raw JSON summaries
    async fn list_event_data_stores(&self) -> Result<Vec<serde_json::Value>>;

    /// Fetch detail for one event data store as raw JSON
    async fn get_event_data_store(&self, arn: &str) -> Result<serde_json::Value>;
}

/// Production implementation over the AWS SDK
#[derive(Clone)]
pub struct SdkCloudTrail {
    client: cloudtrail::Client,
}

impl SdkCloudTrail {
    /// Create a client from a resolved SDK config
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: cloudtrail::Client::new(config),
        }
    }

    /// Create a client pinned to a specific region
    pub fn for_region(config: &aws_config::SdkConfig, region: &str) -> Self {
        let conf = cloudtrail::config::Builder::from(config)
            .region(aws_types::region::Region::new(region.to_string()))
            .build();
        Self {
            client: cloudtrail::Client::from_conf(conf),
        }
    }

    fn to_sdk_attribute_key(key: &str) -> Result<cloudtrail::types::LookupAttributeKey> {
        use cloudtrail::types::LookupAttributeKey;
        Ok(match key {
            "EventId" => LookupAttributeKey::EventId,
            "EventName" => LookupAttributeKey::EventName,
            "ReadOnly" => LookupAttributeKey::ReadOnly,
            "Username" => LookupAttributeKey::Username,
            "ResourceType" => LookupAttributeKey::ResourceType,
            "ResourceName" => LookupAttributeKey::ResourceName,
            "EventSource" => LookupAttributeKey::EventSource,
            "AccessKeyId" => LookupAttributeKey::AccessKeyId,
            other => anyhow::bail!("unsupported lookup attribute key: {}", other),
        })
    }

    fn smithy_time(dt: &DateTime<Utc>) -> SmithyDateTime {
        SmithyDateTime::from_millis(dt.timestamp_millis())
    }

    fn chrono_time(dt: Option<&SmithyDateTime>) -> Option<DateTime<Utc>> {
        dt.and_then(|d| d.to_millis().ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    fn store_summary_json(store: &cloudtrail::types::EventDataStore) -> serde_json::Value {
        serde_json::json!({
            "event_data_store_arn": store.event_data_store_arn(),
            "name": store.name(),
            "status": store.status().map(|s| s.as_str()),
            "multi_region_enabled": store.multi_region_enabled(),
            "organization_enabled": store.organization_enabled(),
            "retention_period": store.retention_period(),
            "termination_protection_enabled": store.termination_protection_enabled(),
        })
    }
}

#[async_trait]
impl CloudTrailApi for SdkCloudTrail {
    async fn lookup_events(&self, request: &LookupPageRequest) -> Result<RecentPage> {
        let mut call = self
            .client
            .lookup_events()
            .start_time(Self::smithy_time(&request.start_time))
            .end_time(Self::smithy_time(&request.end_time))
            .max_results(request.page_size);

        if let Some(filter) = &request.filter {
            let attr = cloudtrail::types::LookupAttribute::builder()
                .attribute_key(Self::to_sdk_attribute_key(&filter.attribute_key)?)
                .attribute_value(&filter.attribute_value)
                .build()
                .with_context(|| "Failed to build lookup attribute")?;
            call = call.lookup_attributes(attr);
        }

        if let Some(token) = &request.next_token {
            call = call.next_token(token);
        }

        let response = call
            .send()
            .await
            .with_context(|| "Failed to lookup CloudTrail events")?;

        let events = response
            .events()
            .iter()
            .map(|event| RawRecentEvent {
                event_id: event.event_id().unwrap_or_default().to_string(),
                event_name: event.event_name().unwrap_or_default().to_string(),
                event_time: Self::chrono_time(event.event_time()),
                event_source: event.event_source().unwrap_or_default().to_string(),
                username: event.username().unwrap_or_default().to_string(),
                resources: event
                    .resources()
                    .iter()
                    .map(|res| RawEventResource {
                        resource_type: res.resource_type().map(|s| s.to_string()),
                        resource_name: res.resource_name().map(|s| s.to_string()),
                    })
                    .collect(),
                cloud_trail_event: event.cloud_trail_event().map(|s| s.to_string()),
                access_key_id: event.access_key_id().map(|s| s.to_string()),
                read_only: event.read_only().map(|s| s.to_string()),
            })
            .collect();

        Ok(RecentPage {
            events,
            next_token: response.next_token().map(|t| t.to_string()),
        })
    }

    async fn start_query(&self, statement: &str) -> Result<String> {
        let response = self
            .client
            .start_query()
            .query_statement(statement)
            .send()
            .await
            .with_context(|| "Failed to start CloudTrail Lake query")?;

        response
            .query_id()
            .map(|id| id.to_string())
            .ok_or_else(|| anyhow::anyhow!("StartQuery returned no query id"))
    }

    async fn describe_query(&self, query_id: &str) -> Result<LakeQueryDescription> {
        let response = self
            .client
            .describe_query()
            .query_id(query_id)
            .send()
            .await
            .with_context(|| format!("Failed to describe query {}", query_id))?;

        use cloudtrail::types::QueryStatus;
        let status = match response.query_status() {
            Some(QueryStatus::Queued) => LakeQueryStatus::Queued,
            Some(QueryStatus::Running) => LakeQueryStatus::Running,
            Some(QueryStatus::Finished) => LakeQueryStatus::Finished,
            Some(QueryStatus::Failed) => LakeQueryStatus::Failed,
            Some(QueryStatus::Cancelled) => LakeQueryStatus::Cancelled,
            Some(QueryStatus::TimedOut) => LakeQueryStatus::TimedOut,
            _ => anyhow::bail!("DescribeQuery returned an unknown status for {}", query_id),
        };

        let statistics = response.query_statistics().map(|s| {
            LakeQueryStatistics {
                events_matched: s.events_matched(),
                events_scanned: s.events_scanned(),
                bytes_scanned: s.bytes_scanned(),
                execution_time_ms: s.execution_time_in_millis().map(|ms| ms as i64),
            }
        });

        Ok(LakeQueryDescription {
            status,
            statistics,
            error_message: response.error_message().map(|m| m.to_string()),
        })
    }

    async fn get_query_results(
        &self,
        query_id: &str,
        next_token: Option<&str>,
        page_size: i32,
    ) -> Result<LakeResultsPage> {
        let mut call = self
            .client
            .get_query_results()
            .query_id(query_id)
            .max_query_results(page_size);

        if let Some(token) = next_token {
            call = call.next_token(token);
        }

        let response = call
            .send()
            .await
            .with_context(|| format!("Failed to fetch results for query {}", query_id))?;

        // Each row arrives as a list of single-entry field/value maps; flatten
        // preserving cell order.
        let rows = response
            .query_result_rows()
            .iter()
            .map(|row| {
                let mut fields = Vec::new();
                for cell in row {
                    for (field, value) in cell {
                        fields.push((field.clone(), value.clone()));
                    }
                }
                RawLakeRow(fields)
            })
            .collect();

        Ok(LakeResultsPage {
            rows,
            next_token: response.next_token().map(|t| t.to_string()),
        })
    }

    async fn list_event_data_stores(&self) -> Result<Vec<serde_json::Value>> {
        let response = self
            .client
            .list_event_data_stores()
            .send()
            .await
            .with_context(|| "Failed to list event data stores")?;

        Ok(response
            .event_data_stores()
            .iter()
            .map(Self::store_summary_json)
            .collect())
    }

    async fn get_event_data_store(&self, arn: &str) -> Result<serde_json::Value> {
        let response = self
            .client
            .get_event_data_store()
            .event_data_store(arn)
            .send()
            .await
            .with_context(|| format!("Failed to get event data store {}", arn))?;

        let selectors: Vec<serde_json::Value> = response
            .advanced_event_selectors()
            .iter()
            .map(|sel| {
                serde_json::json!({
                    "name": sel.name(),
                    "field_selectors": sel
                        .field_selectors()
                        .iter()
                        .map(|fs| {
                            serde_json::json!({
                                "field": fs.field(),
                                "equals": fs.equals(),
                                "starts_with": fs.starts_with(),
                                "not_equals": fs.not_equals(),
                            })
                        })
                        .collect::<Vec<_>>(),
                })
            })
            .collect();

        Ok(serde_json::json!({
            "event_data_store_arn": response.event_data_store_arn(),
            "name": response.name(),
            "status": response.status().map(|s| s.as_str()),
            "multi_region_enabled": response.multi_region_enabled(),
            "organization_enabled": response.organization_enabled(),
            "retention_period": response.retention_period(),
            "advanced_event_selectors": selectors,
        }))
    }
}
