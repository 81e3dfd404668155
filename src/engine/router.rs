//! Query routing and response assembly
//!
//! The router is the engine's single entry point: it validates a request,
//! picks the execution surface, runs the executor, and composes the
//! normalizer and budget truncator over the raw records. It is stateless;
//! everything a caller needs to continue lives in the continuation token.

use super::budget::BudgetTruncator;
use super::config::EngineConfig;
use super::error::QueryError;
use super::historical::HistoricalQueryExecutor;
use super::normalize::{normalize_lake_row, normalize_recent};
use super::rate_limit::RateLimiter;
use super::recent::{FetchedBatch, RecentLookupExecutor};
use super::retry::RetryExecutor;
use super::stores::{DataStoreCatalog, DataStoreListing};
use super::token::{query_fingerprint, ContinuationToken, CursorState, PagePosition};
use super::types::{ActivityEvent, ActivityQuery, ActivityResponse, QueryMode};
use super::upstream::{CloudTrailApi, LakeQueryDescription};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Top-level query orchestrator
pub struct QueryRouter {
    config: EngineConfig,
    recent: RecentLookupExecutor,
    historical: HistoricalQueryExecutor,
    stores: DataStoreCatalog,
}

impl QueryRouter {
    /// Build a router and its executors around one shared rate limiter
    pub fn new(api: Arc<dyn CloudTrailApi>, config: EngineConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            config.rate_capacity,
            config.rate_refill_per_sec,
        ));
        let retry = RetryExecutor::from_config(&config);

        Self {
            recent: RecentLookupExecutor::new(
                api.clone(),
                limiter.clone(),
                retry.clone(),
                &config,
            ),
            historical: HistoricalQueryExecutor::new(
                api.clone(),
                limiter.clone(),
                retry.clone(),
                config.clone(),
            ),
            stores: DataStoreCatalog::new(api, limiter, retry),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute a query without external cancellation
    pub async fn execute(&self, query: ActivityQuery) -> Result<ActivityResponse, QueryError> {
        self.execute_cancellable(query, &CancellationToken::new())
            .await
    }

    /// Execute a query; cancellation is observed at the next suspension
    /// boundary of the underlying executor
    pub async fn execute_cancellable(
        &self,
        query: ActivityQuery,
        cancel: &CancellationToken,
    ) -> Result<ActivityResponse, QueryError> {
        self.validate(&query)?;

        let fingerprint = query_fingerprint(&query);
        let token = match &query.continuation_token {
            Some(raw) => {
                let token = ContinuationToken::decode(raw)?;
                token.validate(fingerprint, self.config.token_ttl)?;
                Some(token)
            }
            None => None,
        };

        // A token pins the mode: pagination must never switch execution paths
        let mode = token
            .as_ref()
            .map(|t| t.mode())
            .unwrap_or_else(|| self.select_mode(&query));

        let request_id = Uuid::new_v4();
        info!(
            %request_id,
            mode = mode.as_str(),
            resuming = token.is_some(),
            max_results = query.max_results,
            "executing activity query"
        );

        match mode {
            QueryMode::Recent => {
                let position = match token.map(|t| t.cursor) {
                    Some(CursorState::Recent { position }) => position,
                    Some(CursorState::Historical { .. }) => {
                        return Err(QueryError::Internal(
                            "recent execution reached with a historical cursor".to_string(),
                        ));
                    }
                    None => PagePosition::start(),
                };

                let batch = self.recent.fetch(&query, position).await?;
                let events: Vec<ActivityEvent> =
                    batch.records.iter().map(normalize_recent).collect();
                Ok(self.assemble(&batch, events, fingerprint, false, |position| {
                    CursorState::Recent { position }
                }))
            }
            QueryMode::Historical => {
                let outcome = match token.map(|t| t.cursor) {
                    Some(CursorState::Historical { query_id, position }) => {
                        self.historical
                            .resume(&query, query_id, position, cancel)
                            .await?
                    }
                    Some(CursorState::Recent { .. }) => {
                        return Err(QueryError::Internal(
                            "historical execution reached with a recent cursor".to_string(),
                        ));
                    }
                    None => self.historical.execute(&query, cancel).await?,
                };

                if outcome.timed_out {
                    warn!(
                        %request_id,
                        query_id = outcome.query_id.as_str(),
                        fetched = outcome.batch.records.len(),
                        "historical query timed out, returning partial response"
                    );
                }

                let events: Vec<ActivityEvent> =
                    outcome.batch.records.iter().map(normalize_lake_row).collect();
                let query_id = outcome.query_id;
                Ok(self.assemble(
                    &outcome.batch,
                    events,
                    fingerprint,
                    outcome.timed_out,
                    move |position| CursorState::Historical {
                        query_id: query_id.clone(),
                        position,
                    },
                ))
            }
        }
    }

    /// Point-in-time status of a previously submitted historical query
    pub async fn historical_status(
        &self,
        query_id: &str,
    ) -> Result<LakeQueryDescription, QueryError> {
        self.historical.describe(query_id).await
    }

    /// List available event data stores
    pub async fn list_event_data_stores(
        &self,
        include_details: bool,
    ) -> Result<DataStoreListing, QueryError> {
        self.stores.list(include_details).await
    }

    fn validate(&self, query: &ActivityQuery) -> Result<(), QueryError> {
        if query.start_time > query.end_time {
            return Err(QueryError::Validation(format!(
                "time range is inverted: {} > {}",
                query.start_time.to_rfc3339(),
                query.end_time.to_rfc3339()
            )));
        }

        let span = query.end_time - query.start_time;
        if span > self.config.max_time_span {
            return Err(QueryError::Validation(format!(
                "time span of {} days exceeds the {}-day ceiling",
                span.num_days(),
                self.config.max_time_span.num_days()
            )));
        }

        if query.max_results == 0 {
            return Err(QueryError::Validation(
                "max_results must be at least 1".to_string(),
            ));
        }
        if query.max_results > self.config.max_results_cap {
            return Err(QueryError::Validation(format!(
                "max_results {} exceeds the cap of {}",
                query.max_results, self.config.max_results_cap
            )));
        }

        Ok(())
    }

    /// Recent mode requires the whole range inside the retention window, no
    /// free text, and at most one attribute filter (the lookup API accepts a
    /// single one); anything else is analytic and goes to the Lake surface.
    fn select_mode(&self, query: &ActivityQuery) -> QueryMode {
        let retention_floor = Utc::now() - self.config.recent_retention;
        let within_window = query.start_time >= retention_floor;
        let lookup_expressible =
            query.free_text.is_none() && query.attribute_filter_count() <= 1;

        if within_window && lookup_expressible {
            QueryMode::Recent
        } else {
            QueryMode::Historical
        }
    }

    fn assemble<T>(
        &self,
        batch: &FetchedBatch<T>,
        events: Vec<ActivityEvent>,
        fingerprint: u64,
        timed_out: bool,
        make_cursor: impl Fn(PagePosition) -> CursorState,
    ) -> ActivityResponse {
        let truncator = BudgetTruncator::new(self.config.response_byte_budget);
        let (kept, truncated) = truncator.truncate(events);

        let continuation_token = batch
            .position_after(kept.len())
            .map(|position| ContinuationToken::new(make_cursor(position), fingerprint).encode());

        ActivityResponse {
            events: kept,
            truncated,
            timed_out,
            continuation_token,
        }
    }
}
