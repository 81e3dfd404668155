//! Dual-mode CloudTrail query orchestration engine
//!
//! Translates structured activity queries into the two CloudTrail query
//! surfaces and manages their very different lifecycles:
//!
//! - **Recent**: the synchronous `LookupEvents` history (last 90 days),
//!   directly paginated ([`recent::RecentLookupExecutor`])
//! - **Historical**: CloudTrail Lake's asynchronous submit/poll/fetch query
//!   over long horizons ([`historical::HistoricalQueryExecutor`])
//!
//! [`router::QueryRouter`] is the entry point: it validates requests, selects
//! the surface, and composes normalization ([`normalize`]) and byte-budget
//! truncation ([`budget`]) over the result. Both executors share one
//! [`rate_limit::RateLimiter`] token bucket and wrap every upstream call in
//! [`retry::RetryExecutor`] backoff. Responses that cannot be completed in
//! one call carry a self-describing continuation token ([`token`]) that
//! survives process restarts.

#![warn(clippy::all, rust_2018_idioms)]

pub mod budget;
pub mod config;
pub mod error;
pub mod historical;
pub mod normalize;
pub mod rate_limit;
pub mod recent;
pub mod retry;
pub mod router;
pub mod stores;
pub mod time_input;
pub mod token;
pub mod types;
pub mod upstream;

pub use budget::BudgetTruncator;
pub use config::EngineConfig;
pub use error::QueryError;
pub use historical::{HistoricalQueryExecutor, JobState};
pub use rate_limit::RateLimiter;
pub use recent::RecentLookupExecutor;
pub use retry::RetryExecutor;
pub use router::QueryRouter;
pub use stores::{DataStoreListing, EventDataStoreSummary};
pub use token::{ContinuationToken, CursorState, PagePosition};
pub use types::{ActivityEvent, ActivityQuery, ActivityResponse, QueryMode, ResourceRef};
pub use upstream::{CloudTrailApi, SdkCloudTrail};
