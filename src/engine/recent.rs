//! Recent-mode executor: synchronous paginated event-history lookup
//!
//! Issues one upstream page call at a time, rate-limited and retry-wrapped,
//! until `max_results` records accumulate or upstream runs out. Upstream
//! pagination cursors pass through unmodified and records keep upstream's
//! reverse-chronological order. Every fetched record is tagged with the page
//! position that would resume AT it, so the router can cut the result
//! anywhere and still hand back an exact continuation.

use super::config::EngineConfig;
use super::error::QueryError;
use super::rate_limit::RateLimiter;
use super::retry::RetryExecutor;
use super::token::PagePosition;
use super::types::ActivityQuery;
use super::upstream::{CloudTrailApi, LookupFilter, LookupPageRequest, RawRecentEvent};
use std::sync::Arc;
use tracing::debug;

/// Safety cap on pages fetched in one call, independent of `max_results`
const MAX_PAGES: u32 = 100;

/// Records fetched by an executor, each with its exact resumption point.
///
/// `resume_points[i]` resumes delivery AT `records[i]`; `end_position` resumes
/// after the last record (None when upstream is exhausted).
#[derive(Debug, Clone)]
pub struct FetchedBatch<T> {
    pub records: Vec<T>,
    pub resume_points: Vec<PagePosition>,
    pub end_position: Option<PagePosition>,
}

impl<T> FetchedBatch<T> {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            resume_points: Vec::new(),
            end_position: None,
        }
    }

    /// Continuation position after keeping only the first `kept` records
    pub fn position_after(&self, kept: usize) -> Option<PagePosition> {
        if kept < self.records.len() {
            self.resume_points.get(kept).cloned()
        } else {
            self.end_position.clone()
        }
    }
}

/// Drives the synchronous lookup path
pub struct RecentLookupExecutor {
    api: Arc<dyn CloudTrailApi>,
    limiter: Arc<RateLimiter>,
    retry: RetryExecutor,
    page_size: i32,
}

impl RecentLookupExecutor {
    pub fn new(
        api: Arc<dyn CloudTrailApi>,
        limiter: Arc<RateLimiter>,
        retry: RetryExecutor,
        config: &EngineConfig,
    ) -> Self {
        Self {
            api,
            limiter,
            retry,
            page_size: config.lookup_page_size,
        }
    }

    /// Fetch up to `query.max_results` records starting at `start`
    pub async fn fetch(
        &self,
        query: &ActivityQuery,
        start: PagePosition,
    ) -> Result<FetchedBatch<RawRecentEvent>, QueryError> {
        let filter = query
            .sole_attribute_filter()
            .map(|(key, value)| LookupFilter {
                attribute_key: key.to_string(),
                attribute_value: value.to_string(),
            });

        let mut batch = FetchedBatch::empty();
        let mut page_token = start.page_token.clone();
        let mut skip = start.skip as usize;
        let mut pages = 0u32;

        loop {
            self.limiter.acquire().await;

            let request = LookupPageRequest {
                start_time: query.start_time,
                end_time: query.end_time,
                filter: filter.clone(),
                page_size: self.page_size,
                next_token: page_token.clone(),
            };
            let page = self
                .retry
                .run("LookupEvents", || self.api.lookup_events(&request))
                .await?;
            pages += 1;

            debug!(
                page_events = page.events.len(),
                skipped = skip.min(page.events.len()),
                accumulated = batch.records.len(),
                "fetched lookup page"
            );

            for (index, event) in page.events.into_iter().enumerate() {
                if index < skip {
                    continue;
                }
                if batch.records.len() >= query.max_results {
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
                batch.records.push(event);
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
                    if batch.records.len() >= query.max_results || pages >= MAX_PAGES {
                        batch.end_position = Some(next_position);
                        return Ok(batch);
                    }
                    page_token = next_position.page_token;
                }
            }
        }
    }
}
