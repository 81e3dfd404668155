//! Engine configuration
//!
//! All tunable constants for the query engine live here. Defaults match the
//! documented CloudTrail service limits (90-day event history, 50 events per
//! lookup page, 2 lookup calls per second) and conservative budgets for the
//! asynchronous Lake query lifecycle.

use chrono::Duration as ChronoDuration;
use std::time::Duration;

/// Configuration for the query engine and its executors
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Retention window of the synchronous event-history lookup surface.
    /// Queries entirely inside this window are eligible for Recent mode.
    pub recent_retention: ChronoDuration,

    /// Hard ceiling on `end - start`. Wider ranges are rejected, not clamped.
    pub max_time_span: ChronoDuration,

    /// Upper bound accepted for `max_results`
    pub max_results_cap: usize,

    /// `max_results` applied when the caller omits it
    pub default_max_results: usize,

    /// Serialized-size budget for a single response (bytes)
    pub response_byte_budget: usize,

    /// Events requested per LookupEvents page (service max is 50)
    pub lookup_page_size: i32,

    /// Rows requested per GetQueryResults page
    pub results_page_size: i32,

    /// Event data store queried in Historical mode. Required before any
    /// Lake query can be submitted.
    pub event_data_store_id: Option<String>,

    /// First status-poll interval for a submitted Lake query
    pub poll_base_interval: Duration,

    /// Ceiling the poll interval grows to
    pub poll_max_interval: Duration,

    /// Wall-clock bound on a single Historical execution (submit through fetch)
    pub historical_deadline: Duration,

    /// Continuation tokens older than this are rejected (Lake keeps query
    /// results for seven days)
    pub token_ttl: Duration,

    /// Retry attempts per upstream call, including the first
    pub retry_max_attempts: u32,

    /// Base delay for retry backoff
    pub retry_base_delay: Duration,

    /// Ceiling for a single retry delay
    pub retry_max_delay: Duration,

    /// Token-bucket capacity shared by all upstream calls
    pub rate_capacity: f64,

    /// Token-bucket refill rate (tokens per second)
    pub rate_refill_per_sec: f64,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            recent_retention: ChronoDuration::days(90),
            max_time_span: ChronoDuration::days(366),
            max_results_cap: 1000,
            default_max_results: 50,
            response_byte_budget: 256 * 1024,
            lookup_page_size: 50,
            results_page_size: 500,
            event_data_store_id: None,
            poll_base_interval: Duration::from_secs(1),
            poll_max_interval: Duration::from_secs(30),
            historical_deadline: Duration::from_secs(300),
            token_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            retry_max_attempts: 5,
            retry_base_delay: Duration::from_millis(200),
            retry_max_delay: Duration::from_secs(10),
            rate_capacity: 4.0,
            rate_refill_per_sec: 2.0,
        }
    }

    /// Builder pattern: set the event data store for Historical queries
    pub fn with_event_data_store(mut self, eds_id: impl Into<String>) -> Self {
        self.event_data_store_id = Some(eds_id.into());
        self
    }

    /// Builder pattern: set the Recent-mode retention window
    pub fn with_recent_retention(mut self, retention: ChronoDuration) -> Self {
        self.recent_retention = retention;
        self
    }

    /// Builder pattern: set the maximum accepted time span
    pub fn with_max_time_span(mut self, span: ChronoDuration) -> Self {
        self.max_time_span = span;
        self
    }

    /// Builder pattern: set the response byte budget
    pub fn with_response_byte_budget(mut self, bytes: usize) -> Self {
        self.response_byte_budget = bytes;
        self
    }

    /// Builder pattern: set the Historical wall-clock deadline
    pub fn with_historical_deadline(mut self, deadline: Duration) -> Self {
        self.historical_deadline = deadline;
        self
    }

    /// Builder pattern: set poll intervals (base and ceiling)
    pub fn with_poll_intervals(mut self, base: Duration, max: Duration) -> Self {
        self.poll_base_interval = base;
        self.poll_max_interval = max;
        self
    }

    /// Builder pattern: set retry behavior
    pub fn with_retry(mut self, max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        self.retry_max_attempts = max_attempts;
        self.retry_base_delay = base_delay;
        self.retry_max_delay = max_delay;
        self
    }

    /// Builder pattern: set the shared token bucket
    pub fn with_rate_limit(mut self, capacity: f64, refill_per_sec: f64) -> Self {
        self.rate_capacity = capacity;
        self.rate_refill_per_sec = refill_per_sec;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
