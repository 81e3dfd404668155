//! Data types for activity queries and canonical events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution mode selected for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryMode {
    /// Synchronous, directly paginated lookup over the 90-day event history
    Recent,
    /// Asynchronous submit/poll/fetch Lake query over long horizons
    Historical,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Recent => "recent",
            QueryMode::Historical => "historical",
        }
    }
}

/// A structured "find what happened" request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityQuery {
    /// Start of the time range (inclusive)
    pub start_time: DateTime<Utc>,

    /// End of the time range (inclusive)
    pub end_time: DateTime<Utc>,

    /// Filter by API operation name (e.g., "RunInstances", "ConsoleLogin")
    pub event_name: Option<String>,

    /// Filter by the identity that made the call (IAM user or role name)
    pub actor: Option<String>,

    /// Filter by affected resource name or identifier
    pub resource: Option<String>,

    /// Free-text search; only the analytic query surface supports this
    pub free_text: Option<String>,

    /// Maximum events returned in one response
    pub max_results: usize,

    /// Opaque token from a prior response, for resumption
    pub continuation_token: Option<String>,
}

impl ActivityQuery {
    /// Create a query over a time range with default result limit
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time,
            event_name: None,
            actor: None,
            resource: None,
            free_text: None,
            max_results: 50,
            continuation_token: None,
        }
    }

    /// Builder pattern: filter by event name
    pub fn with_event_name(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = Some(event_name.into());
        self
    }

    /// Builder pattern: filter by actor identity
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Builder pattern: filter by resource name
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Builder pattern: free-text search term
    pub fn with_free_text(mut self, free_text: impl Into<String>) -> Self {
        self.free_text = Some(free_text.into());
        self
    }

    /// Builder pattern: set max results
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Builder pattern: set continuation token
    pub fn with_continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }

    /// Number of attribute filters set (event name, actor, resource).
    ///
    /// The lookup API accepts a single attribute, so more than one forces
    /// Historical mode.
    pub fn attribute_filter_count(&self) -> usize {
        [&self.event_name, &self.actor, &self.resource]
            .iter()
            .filter(|f| f.is_some())
            .count()
    }

    /// The single attribute filter as a (lookup key, value) pair, when exactly
    /// one is set
    pub fn sole_attribute_filter(&self) -> Option<(&'static str, &str)> {
        if self.attribute_filter_count() != 1 {
            return None;
        }
        if let Some(v) = &self.event_name {
            return Some(("EventName", v));
        }
        if let Some(v) = &self.actor {
            return Some(("Username", v));
        }
        self.resource.as_deref().map(|v| ("ResourceName", v))
    }
}

/// A resource touched by an activity event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource type (e.g., "AWS::EC2::Instance")
    pub resource_type: Option<String>,

    /// Resource name or identifier
    pub resource_name: Option<String>,
}

/// Canonical activity event, produced only by the normalizer.
///
/// Both upstream record shapes map into this; missing upstream fields become
/// empty or absent, never fabricated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Unique event identifier
    pub event_id: String,

    /// When the event occurred; absent if upstream omitted it
    pub event_time: Option<DateTime<Utc>>,

    /// API operation (e.g., "RunInstances")
    pub event_name: String,

    /// Originating service (e.g., "ec2.amazonaws.com")
    pub event_source: String,

    /// Identity that made the call; empty when upstream omitted it
    pub actor_identity: String,

    /// Source IP address of the call
    pub source_ip: Option<String>,

    /// Region the event was recorded in
    pub aws_region: Option<String>,

    /// Resources touched, in upstream order
    pub resources: Vec<ResourceRef>,

    /// Full upstream payload, when available (can be large)
    pub raw_payload: Option<serde_json::Value>,

    /// True if the call did not modify resources
    pub read_only: bool,
}

/// Unified response returned through the tool boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityResponse {
    /// Normalized events, per-query order preserved
    pub events: Vec<ActivityEvent>,

    /// True if the byte budget dropped records from this response
    pub truncated: bool,

    /// True if a Historical query hit its wall-clock deadline; events hold
    /// whatever was fetched before the deadline
    pub timed_out: bool,

    /// Echo this back to resume exactly after the last returned event
    pub continuation_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_query_builder() {
        let query = ActivityQuery::new(t(1000), t(2000))
            .with_event_name("ConsoleLogin")
            .with_max_results(25);

        assert_eq!(query.start_time, t(1000));
        assert_eq!(query.end_time, t(2000));
        assert_eq!(query.event_name.as_deref(), Some("ConsoleLogin"));
        assert_eq!(query.max_results, 25);
        assert!(query.continuation_token.is_none());
    }

    #[test]
    fn test_attribute_filter_count() {
        let query = ActivityQuery::new(t(0), t(1));
        assert_eq!(query.attribute_filter_count(), 0);

        let query = query.with_event_name("CreateBucket").with_actor("alice");
        assert_eq!(query.attribute_filter_count(), 2);
        assert!(query.sole_attribute_filter().is_none());
    }

    #[test]
    fn test_sole_attribute_filter() {
        let query = ActivityQuery::new(t(0), t(1)).with_actor("alice");
        assert_eq!(query.sole_attribute_filter(), Some(("Username", "alice")));

        let query = ActivityQuery::new(t(0), t(1)).with_resource("i-1234567890abcdef0");
        assert_eq!(
            query.sole_attribute_filter(),
            Some(("ResourceName", "i-1234567890abcdef0"))
        );
    }

    #[test]
    fn test_activity_event_serialization() {
        let event = ActivityEvent {
            event_id: "ev-1".to_string(),
            event_time: Some(t(1234567890)),
            event_name: "RunInstances".to_string(),
            event_source: "ec2.amazonaws.com".to_string(),
            actor_identity: "alice".to_string(),
            source_ip: Some("203.0.113.10".to_string()),
            aws_region: Some("us-east-1".to_string()),
            resources: vec![ResourceRef {
                resource_type: Some("AWS::EC2::Instance".to_string()),
                resource_name: Some("i-1234567890abcdef0".to_string()),
            }],
            raw_payload: None,
            read_only: false,
        };

        let json = serde_json::to_string(&event).unwrap();
        let back: ActivityEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_id, "ev-1");
        assert_eq!(back.resources.len(), 1);
    }
}
