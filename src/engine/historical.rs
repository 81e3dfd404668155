//! Historical-mode executor: the asynchronous Lake query state machine
//!
//! CloudTrail Lake queries are submit-then-poll, decoupled from the calling
//! request's lifetime. The lifecycle is an explicit tagged state machine:
//!
//! ```text
//! SUBMITTING → PENDING ⇄ RUNNING → FINISHED → FETCHING → DONE
//! ```
//!
//! with exits FAILED (upstream rejection, detail preserved verbatim),
//! TIMED_OUT (wall-clock deadline; the job is abandoned upstream and whatever
//! was fetched is returned), and CANCELLED (caller cancellation, observed at
//! the next poll boundary; no further upstream calls). Poll intervals grow
//! exponentially toward a ceiling, reflecting expected job duration, not
//! error recovery; transient poll failures are the retry executor's job.

use super::config::EngineConfig;
use super::error::QueryError;
use super::rate_limit::RateLimiter;
use super::recent::FetchedBatch;
use super::retry::RetryExecutor;
use super::token::PagePosition;
use super::types::ActivityQuery;
use super::upstream::{CloudTrailApi, LakeQueryDescription, LakeQueryStatus, RawLakeRow};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle state of a Lake query driven by this executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitting,
    Pending,
    Running,
    Finished,
    Fetching,
    Done,
    Failed,
    TimedOut,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Submitting => "SUBMITTING",
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Finished => "FINISHED",
            JobState::Fetching => "FETCHING",
            JobState::Done => "DONE",
            JobState::Failed => "FAILED",
            JobState::TimedOut => "TIMED_OUT",
            JobState::Cancelled => "CANCELLED",
        }
    }
}

/// A Lake query tracked for the duration of one engine call.
///
/// Owned exclusively by the task driving it; dropped once all pages are
/// fetched or the job is abandoned. The upstream query may keep running
/// after abandonment; it is simply no longer tracked.
#[derive(Debug)]
pub struct HistoricalQueryJob {
    pub query_id: Option<String>,
    pub state: JobState,
    pub submitted_at: Instant,
    pub last_polled_at: Option<Instant>,
    pub poll_interval: Duration,
    pub deadline: Instant,
    pub polls: u32,
}

impl HistoricalQueryJob {
    fn new(config: &EngineConfig) -> Self {
        let now = Instant::now();
        Self {
            query_id: None,
            state: JobState::Submitting,
            submitted_at: now,
            last_polled_at: None,
            poll_interval: config.poll_base_interval,
            deadline: now + config.historical_deadline,
            polls: 0,
        }
    }

    fn transition(&mut self, to: JobState) {
        debug!(
            query_id = self.query_id.as_deref().unwrap_or("-"),
            from = self.state.as_str(),
            to = to.as_str(),
            "historical query state transition"
        );
        self.state = to;
    }
}

/// Result of driving a historical query to a stopping point
#[derive(Debug)]
pub struct HistoricalOutcome {
    pub query_id: String,
    pub batch: FetchedBatch<RawLakeRow>,
    pub timed_out: bool,
}

/// Drives the asynchronous Lake query path
pub struct HistoricalQueryExecutor {
    api: Arc<dyn CloudTrailApi>,
    limiter: Arc<RateLimiter>,
    retry: RetryExecutor,
    config: EngineConfig,
}

impl HistoricalQueryExecutor {
    pub fn new(
        api: Arc<dyn CloudTrailApi>,
        limiter: Arc<RateLimiter>,
        retry: RetryExecutor,
        config: EngineConfig,
    ) -> Self {
        Self {
            api,
            limiter,
            retry,
            config,
        }
    }

    /// Submit a new Lake query and drive it until DONE, a deadline, or a
    /// failure exit
    pub async fn execute(
        &self,
        query: &ActivityQuery,
        cancel: &CancellationToken,
    ) -> Result<HistoricalOutcome, QueryError> {
        let statement = self.build_query_statement(query)?;
        let mut job = HistoricalQueryJob::new(&self.config);

        info!(statement = statement.as_str(), "submitting historical query");
        self.limiter.acquire().await;
        let query_id = match self
            .retry
            .run("StartQuery", || self.api.start_query(&statement))
            .await
        {
            Ok(id) => id,
            Err(error) => {
                job.transition(JobState::Failed);
                return Err(error);
            }
        };
        job.query_id = Some(query_id.clone());
        job.transition(JobState::Pending);

        self.drive(query, &mut job, query_id, PagePosition::start(), cancel)
            .await
    }

    /// Resume a previously issued query at a recorded page position.
    ///
    /// The query id is re-validated upstream first: in-memory job state does
    /// not survive process restarts, so an unknown or expired id must fail
    /// with a distinguishable token error instead of resubmitting.
    pub async fn resume(
        &self,
        query: &ActivityQuery,
        query_id: String,
        position: PagePosition,
        cancel: &CancellationToken,
    ) -> Result<HistoricalOutcome, QueryError> {
        let description = match self.describe(&query_id).await {
            Ok(d) => d,
            Err(QueryError::UpstreamRejection { code, message })
                if code.contains("NotFound") || message.contains("not found") =>
            {
                return Err(QueryError::InvalidToken(format!(
                    "historical query {} no longer exists upstream",
                    query_id
                )));
            }
            Err(error) => return Err(error),
        };

        let mut job = HistoricalQueryJob::new(&self.config);
        job.query_id = Some(query_id.clone());
        job.polls = 1;
        job.last_polled_at = Some(Instant::now());

        match description.status {
            LakeQueryStatus::Finished => {
                job.transition(JobState::Finished);
                self.drive(query, &mut job, query_id, position, cancel).await
            }
            LakeQueryStatus::Queued | LakeQueryStatus::Running => {
                // Still running upstream; fall back into the poll loop
                job.transition(JobState::Pending);
                self.drive(query, &mut job, query_id, position, cancel).await
            }
            terminal => Err(Self::terminal_status_error(terminal, &description)),
        }
    }

    /// Point-in-time status of a Lake query, without driving the lifecycle
    pub async fn describe(&self, query_id: &str) -> Result<LakeQueryDescription, QueryError> {
        self.limiter.acquire().await;
        self.retry
            .run("DescribeQuery", || self.api.describe_query(query_id))
            .await
    }

    /// The state-machine stepping loop: polls until FINISHED, then fetches
    async fn drive(
        &self,
        query: &ActivityQuery,
        job: &mut HistoricalQueryJob,
        query_id: String,
        start_position: PagePosition,
        cancel: &CancellationToken,
    ) -> Result<HistoricalOutcome, QueryError> {
        loop {
            match job.state {
                JobState::Pending | JobState::Running => {
                    if cancel.is_cancelled() {
                        job.transition(JobState::Cancelled);
                        return Err(QueryError::Cancelled);
                    }
                    if Instant::now() >= job.deadline {
                        job.transition(JobState::TimedOut);
                        warn!(
                            query_id = query_id.as_str(),
                            polls = job.polls,
                            "historical query abandoned at deadline while waiting"
                        );
                        return Ok(HistoricalOutcome {
                            query_id,
                            batch: FetchedBatch::empty(),
                            timed_out: true,
                        });
                    }

                    self.limiter.acquire().await;
                    let description = self
                        .retry
                        .run("DescribeQuery", || self.api.describe_query(&query_id))
                        .await?;
                    job.polls += 1;
                    job.last_polled_at = Some(Instant::now());

                    match description.status {
                        LakeQueryStatus::Queued => job.transition(JobState::Pending),
                        LakeQueryStatus::Running => job.transition(JobState::Running),
                        LakeQueryStatus::Finished => {
                            job.transition(JobState::Finished);
                            continue;
                        }
                        terminal => {
                            job.transition(JobState::Failed);
                            return Err(Self::terminal_status_error(terminal, &description));
                        }
                    }

                    // Bounded, cancellable wait before the next poll
                    let remaining = job.deadline.saturating_duration_since(Instant::now());
                    let wait = job.poll_interval.min(remaining);
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            job.transition(JobState::Cancelled);
                            return Err(QueryError::Cancelled);
                        }
                        _ = tokio::time::sleep(wait) => {}
                    }
                    job.poll_interval =
                        (job.poll_interval * 2).min(self.config.poll_max_interval);
                }
                JobState::Finished => {
                    job.transition(JobState::Fetching);
                }
                JobState::Fetching => {
                    let batch = self
                        .fetch_pages(&query_id, query.max_results, start_position.clone(), job, cancel)
                        .await?;
                    let timed_out = job.state == JobState::TimedOut;
                    if !timed_out {
                        job.transition(JobState::Done);
                    }
                    return Ok(HistoricalOutcome {
                        query_id,
                        batch,
                        timed_out,
                    });
                }
                unexpected => {
                    return Err(QueryError::Internal(format!(
                        "historical query loop entered {} state",
                        unexpected.as_str()
                    )));
                }
            }
        }
    }

    /// Paginate finished-query results, preserving upstream row order and
    /// tagging every row with its exact resumption point
    async fn fetch_pages(
        &self,
        query_id: &str,
        max_results: usize,
        start: PagePosition,
        job: &mut HistoricalQueryJob,
        cancel: &CancellationToken,
    ) -> Result<FetchedBatch<RawLakeRow>, QueryError> {
        let mut batch = FetchedBatch::empty();
        let mut page_token = start.page_token.clone();
        let mut skip = start.skip as usize;

        loop {
            if cancel.is_cancelled() {
                job.transition(JobState::Cancelled);
                return Err(QueryError::Cancelled);
            }
            if Instant::now() >= job.deadline {
                // Preserve what was already fetched; resumable at the current page
                job.transition(JobState::TimedOut);
                warn!(
                    query_id,
                    fetched = batch.records.len(),
                    "historical query deadline hit mid-fetch, returning partial results"
                );
                batch.end_position = Some(PagePosition {
                    page_token: page_token.clone(),
                    skip: skip as u32,
                });
                return Ok(batch);
            }

            self.limiter.acquire().await;
            let page = self
                .retry
                .run("GetQueryResults", || {
                    self.api
                        .get_query_results(query_id, page_token.as_deref(), self.config.results_page_size)
                })
                .await?;

            debug!(
                query_id,
                page_rows = page.rows.len(),
                accumulated = batch.records.len(),
                "fetched results page"
            );

            for (index, row) in page.rows.into_iter().enumerate() {
                if index < skip {
                    continue;
                }
                if batch.records.len() >= max_results {
                    batch.end_position = Some(PagePosition {
                        page_token: page_token.clone(),
                        skip: index as u32,
                    });
                    return Ok(batch);
                }
                batch.resume_points.push(PagePosition {
                    page_token: page_token.clone(),
                    skip: index as u32,
                });
                batch.records.push(row);
            }
            skip = 0;

            match page.next_token {
                None => {
                    batch.end_position = None;
                    return Ok(batch);
                }
                Some(next) => {
                    let next_position = PagePosition {
                        page_token: Some(next),
                        skip: 0,
                    };
                    if batch.records.len() >= max_results {
                        batch.end_position = Some(next_position);
                        return Ok(batch);
                    }
                    page_token = next_position.page_token;
                }
            }
        }
    }

    fn terminal_status_error(
        status: LakeQueryStatus,
        description: &LakeQueryDescription,
    ) -> QueryError {
        QueryError::UpstreamRejection {
            code: format!("Query{}", match status {
                LakeQueryStatus::Failed => "Failed",
                LakeQueryStatus::Cancelled => "Cancelled",
                LakeQueryStatus::TimedOut => "TimedOut",
                other => other.as_str(),
            }),
            message: description
                .error_message
                .clone()
                .unwrap_or_else(|| format!("query ended with status {}", status.as_str())),
        }
    }

    /// Translate an `ActivityQuery` into a Lake SQL statement.
    ///
    /// The Lake surface speaks Trino-compatible SELECT statements against an
    /// event data store id; field aliases are quoted so result columns match
    /// the normalizer's keys.
    pub fn build_query_statement(&self, query: &ActivityQuery) -> Result<String, QueryError> {
        let eds_id = self.config.event_data_store_id.as_deref().ok_or_else(|| {
            QueryError::Validation(
                "no event data store configured for historical queries".to_string(),
            )
        })?;

        let mut predicates = vec![
            format!(
                "eventtime >= '{}'",
                query.start_time.format("%Y-%m-%d %H:%M:%S")
            ),
            format!(
                "eventtime <= '{}'",
                query.end_time.format("%Y-%m-%d %H:%M:%S")
            ),
        ];

        if let Some(event_name) = &query.event_name {
            predicates.push(format!("eventname = '{}'", escape_sql(event_name)));
        }
        if let Some(actor) = &query.actor {
            predicates.push(format!(
                "(useridentity.username = '{0}' OR useridentity.arn LIKE '%{0}%')",
                escape_sql(actor)
            ));
        }
        if let Some(resource) = &query.resource {
            predicates.push(format!(
                "any_match(resources, r -> r.arn LIKE '%{}%')",
                escape_sql(resource)
            ));
        }
        if let Some(free_text) = &query.free_text {
            let needle = escape_sql(free_text);
            predicates.push(format!(
                "(eventname LIKE '%{0}%' OR eventsource LIKE '%{0}%' OR useridentity.arn LIKE '%{0}%')",
                needle
            ));
        }

        Ok(format!(
            "SELECT eventid, eventtime, eventname, eventsource, \
             useridentity.arn AS \"useridentity.arn\", \
             useridentity.username AS \"useridentity.username\", \
             sourceipaddress, awsregion, readonly, resources \
             FROM {} WHERE {} ORDER BY eventtime DESC",
            eds_id,
            predicates.join(" AND ")
        ))
    }
}

/// Escape a value for inclusion in a single-quoted SQL literal
fn escape_sql(value: &str) -> String {
    value.replace('\'', "''")
}
