//! End-to-end routing scenarios against the fake upstream

mod common;

use chrono::{Duration, Utc};
use common::{make_lake_rows, make_recent_events, test_config, FakeCloudTrail};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use trailscope::engine::{ActivityQuery, QueryError, QueryRouter};

#[tokio::test]
async fn test_last_day_query_runs_recent_mode() {
    let now = Utc::now();
    let fake = Arc::new(FakeCloudTrail {
        recent_events: make_recent_events(120, now),
        ..Default::default()
    });
    let router = QueryRouter::new(fake.clone(), test_config());

    let query = ActivityQuery::new(now - Duration::hours(24), now).with_max_results(50);
    let response = router.execute(query).await.unwrap();

    assert_eq!(response.events.len(), 50);
    assert!(!response.timed_out);
    assert!(response.continuation_token.is_some());
    assert!(fake.call_count("LookupEvents") >= 1);
    assert_eq!(fake.call_count("StartQuery"), 0);

    // Upstream reverse-chronological order preserved, never resorted
    for pair in response.events.windows(2) {
        assert!(pair[0].event_time >= pair[1].event_time);
    }
    assert_eq!(response.events[0].event_id, "recent-0000");
    assert_eq!(response.events[0].aws_region.as_deref(), Some("us-east-1"));
}

#[tokio::test(start_paused = true)]
async fn test_two_year_old_query_runs_historical_with_pagination() {
    let fake = Arc::new(FakeCloudTrail {
        lake_rows: make_lake_rows(150),
        polls_until_finished: 3,
        ..Default::default()
    });
    let router = QueryRouter::new(fake.clone(), test_config());

    let start = Utc::now() - Duration::days(730);
    let query = ActivityQuery::new(start, start + Duration::days(7)).with_max_results(100);

    let first = router.execute(query.clone()).await.unwrap();
    assert_eq!(fake.call_count("StartQuery"), 1);
    assert_eq!(fake.polls(), 3);
    assert_eq!(first.events.len(), 100);
    assert!(!first.timed_out);
    let token = first
        .continuation_token
        .clone()
        .expect("rows remain, so a token must be issued");

    let second = router
        .execute(query.with_continuation_token(token))
        .await
        .unwrap();
    assert_eq!(second.events.len(), 50);
    assert!(second.continuation_token.is_none());
    // Resumption must not resubmit the query
    assert_eq!(fake.call_count("StartQuery"), 1);

    // No duplicates across the two responses
    let mut seen = std::collections::HashSet::new();
    for event in first.events.iter().chain(second.events.iter()) {
        assert!(seen.insert(event.event_id.clone()), "duplicate {}", event.event_id);
    }
    assert_eq!(seen.len(), 150);
}

#[tokio::test]
async fn test_malformed_token_fails_before_any_upstream_call() {
    let fake = Arc::new(FakeCloudTrail::default());
    let router = QueryRouter::new(fake.clone(), test_config());

    let now = Utc::now();
    let query = ActivityQuery::new(now - Duration::hours(1), now)
        .with_continuation_token("definitely-not-a-token");

    let result = router.execute(query).await;
    assert!(matches!(result, Err(QueryError::InvalidToken(_))));
    assert_eq!(fake.total_calls(), 0);
}

#[tokio::test]
async fn test_free_text_routes_to_historical_even_inside_window() {
    let fake = Arc::new(FakeCloudTrail {
        lake_rows: make_lake_rows(5),
        polls_until_finished: 1,
        ..Default::default()
    });
    let router = QueryRouter::new(fake.clone(), test_config());

    let now = Utc::now();
    let query = ActivityQuery::new(now - Duration::hours(12), now).with_free_text("s3");
    let response = router.execute(query).await.unwrap();

    assert_eq!(fake.call_count("LookupEvents"), 0);
    assert_eq!(fake.call_count("StartQuery"), 1);
    assert_eq!(response.events.len(), 5);
    assert_eq!(response.events[0].event_source, "s3.amazonaws.com");
}

#[tokio::test]
async fn test_multiple_filters_route_to_historical() {
    let fake = Arc::new(FakeCloudTrail {
        lake_rows: make_lake_rows(3),
        polls_until_finished: 1,
        ..Default::default()
    });
    let router = QueryRouter::new(fake.clone(), test_config());

    let now = Utc::now();
    let query = ActivityQuery::new(now - Duration::hours(12), now)
        .with_event_name("PutObject")
        .with_actor("alice");
    router.execute(query).await.unwrap();

    assert_eq!(fake.call_count("LookupEvents"), 0);
    assert_eq!(fake.call_count("StartQuery"), 1);
}

#[tokio::test]
async fn test_list_event_data_stores_degrades_detail_failures() {
    let broken_arn = "arn:aws:cloudtrail:us-east-1:123456789012:eventdatastore/broken";
    let fake = Arc::new(FakeCloudTrail {
        stores: vec![
            serde_json::json!({
                "name": "broken",
                "event_data_store_arn": broken_arn,
                "status": "ENABLED",
                "retention_period": 366,
            }),
            serde_json::json!({
                "name": "healthy",
                "event_data_store_arn": "arn:aws:cloudtrail:us-east-1:123456789012:eventdatastore/ok",
                "status": "ENABLED",
                "multi_region_enabled": true,
            }),
        ],
        store_detail_fails_for: Some(broken_arn.to_string()),
        ..Default::default()
    });
    let router = QueryRouter::new(fake.clone(), test_config());

    let listing = router.list_event_data_stores(true).await.unwrap();
    assert_eq!(listing.total_stores, 2);
    assert_eq!(listing.enabled_stores, 2);
    assert_eq!(listing.multi_region_stores, 1);

    let broken = listing
        .stores
        .iter()
        .find(|s| s.name.as_deref() == Some("broken"))
        .unwrap();
    let healthy = listing
        .stores
        .iter()
        .find(|s| s.name.as_deref() == Some("healthy"))
        .unwrap();
    // Detail failure degrades to the undetailed summary
    assert!(broken.advanced_event_selectors.is_none());
    assert!(healthy.advanced_event_selectors.is_some());
}
