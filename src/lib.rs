//! Trailscope - AWS CloudTrail activity for LLM tool-calling hosts
//!
//! Trailscope answers "find what happened" questions against an AWS account's
//! CloudTrail activity and packages the answers for a model's finite context
//! window. It orchestrates the two CloudTrail query surfaces behind one
//! request shape:
//!
//! - **Recent lookups**: the synchronous, directly paginated `LookupEvents`
//!   history covering roughly the last 90 days
//! - **Historical queries**: CloudTrail Lake's asynchronous submit/poll/fetch
//!   analytic surface for long horizons and free-text search
//!
//! # Architecture Overview
//!
//! - **Engine** ([`engine`]): request routing, the asynchronous query state
//!   machine, shared rate limiting, retry/backoff, result normalization, and
//!   byte-budget truncation
//! - **Tools** ([`tools`]): the operations exposed to a tool-calling host as
//!   name + JSON schema + async execute
//!
//! The host protocol, credential resolution, and log sinks are external
//! collaborators: the engine takes a resolved `aws_config::SdkConfig` (or any
//! [`engine::CloudTrailApi`] implementation) and emits `tracing` events.
//!
//! # Getting Started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trailscope::engine::{EngineConfig, QueryRouter, SdkCloudTrail};
//! use trailscope::tools::builtin_tools;
//!
//! # async fn run() {
//! let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
//! let api = Arc::new(SdkCloudTrail::new(&aws_config));
//! let config = EngineConfig::new().with_event_data_store("my-eds-id");
//! let router = Arc::new(QueryRouter::new(api, config));
//!
//! for tool in builtin_tools(router) {
//!     println!("{}: {}", tool.name(), tool.description());
//! }
//! # }
//! ```

#![warn(clippy::all, rust_2018_idioms)]

pub mod engine;
pub mod tools;

pub use engine::{ActivityEvent, ActivityQuery, ActivityResponse, EngineConfig, QueryError, QueryRouter};
