// Metric fetch: chunking, narrowing retry, quota failure

mod common;

use common::*;
use msstats::error::ReportError;
use msstats::fetcher::MetricFetcher;
use msstats::models::*;
use msstats::retry::{Narrowing, RetryPolicy};
use std::sync::Arc;

fn memory_type() -> &'static str {
    Product::Redis.metric_type(MetricKind::MemoryUsage).unwrap()
}

fn backend_with_memory() -> FakeBackend {
    let points: Vec<(i64, f64)> = (0..60).map(|i| (at(i), i as f64)).collect();
    FakeBackend::new().with_series(
        "p1",
        redis_series("p1", "cache-a", "node-0", MetricKind::MemoryUsage, &points),
    )
}

#[tokio::test]
async fn fetch_returns_points_for_the_instance() {
    let backend = Arc::new(backend_with_memory());
    let fetcher = MetricFetcher::new(backend.clone(), RetryPolicy::default(), 100_000, 100);
    let instance = redis_instance("p1", "cache-a", &["node-0"]);

    let fetched = fetcher
        .fetch(&instance, MetricKind::MemoryUsage, window())
        .await
        .unwrap();
    assert!(!fetched.narrowed());
    assert_eq!(fetched.series.len(), 1);
    assert_eq!(fetched.series[0].node_id.as_deref(), Some("node-0"));
    assert_eq!(fetched.series[0].points.len(), 60);
    assert_eq!(backend.full_queries(memory_type()).len(), 1);
}

#[tokio::test]
async fn large_window_is_split_and_merged_without_duplicates() {
    let backend = Arc::new(backend_with_memory());
    // One node, one series: ten points per request.
    let fetcher = MetricFetcher::new(backend.clone(), RetryPolicy::default(), 10, 100);
    let instance = redis_instance("p1", "cache-a", &["node-0"]);

    let fetched = fetcher
        .fetch(&instance, MetricKind::MemoryUsage, window())
        .await
        .unwrap();
    assert_eq!(backend.full_queries(memory_type()).len(), 6);
    assert_eq!(fetched.series.len(), 1);
    let points = &fetched.series[0].points;
    assert_eq!(points.len(), 60);
    assert!(points.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[tokio::test]
async fn over_limit_query_is_narrowed_once_then_fails() {
    let backend = Arc::new(backend_with_memory().with_quota(0));
    let fetcher = MetricFetcher::new(backend.clone(), RetryPolicy::default(), 100_000, 100);
    let instance = redis_instance("p1", "cache-a", &["node-0"]);

    let err = fetcher
        .fetch(&instance, MetricKind::MemoryUsage, window())
        .await
        .unwrap_err();

    let queries = backend.full_queries(memory_type());
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].window.step_secs, 60);
    assert_eq!(queries[1].window.step_secs, 120);
    match err {
        ReportError::QuotaExceeded {
            metric,
            duration_secs,
            step_secs,
        } => {
            assert_eq!(metric, memory_type());
            assert_eq!(duration_secs, 3600);
            assert_eq!(step_secs, 120);
        }
        other => panic!("expected QuotaExceeded, got {:?}", other),
    }
}

#[tokio::test]
async fn narrowed_query_succeeds_and_is_noted() {
    // 60 points at 60s is over the limit, 30 at 120s fits.
    let backend = Arc::new(backend_with_memory().with_quota(30));
    let fetcher = MetricFetcher::new(backend.clone(), RetryPolicy::default(), 100_000, 100);
    let instance = redis_instance("p1", "cache-a", &["node-0"]);

    let fetched = fetcher
        .fetch(&instance, MetricKind::MemoryUsage, window())
        .await
        .unwrap();
    assert!(fetched.narrowed());
    assert_eq!(fetched.window.step_secs, 120);
    let note = fetched.note().unwrap();
    assert!(note.contains("step widened from 60s to 120s"));
}

#[tokio::test]
async fn shorten_window_narrowing_keeps_the_end() {
    let backend = Arc::new(backend_with_memory().with_quota(30));
    let policy = RetryPolicy::new(2, Narrowing::ShortenWindow, 2);
    let fetcher = MetricFetcher::new(backend.clone(), policy, 100_000, 100);
    let instance = redis_instance("p1", "cache-a", &["node-0"]);

    let fetched = fetcher
        .fetch(&instance, MetricKind::MemoryUsage, window())
        .await
        .unwrap();
    assert_eq!(fetched.window.end, window().end);
    assert_eq!(fetched.window.duration_secs(), 1800);
    assert_eq!(fetched.series[0].points.len(), 30);
    assert!(fetched.note().unwrap().contains("window shortened"));
}

#[tokio::test]
async fn fetch_instance_collects_every_published_metric() {
    let backend = Arc::new(
        backend_with_memory()
            .with_series(
                "p1",
                redis_command_series("p1", "cache-a", "node-0", "set", &[(at(1), 5.0)]),
            )
            .with_series(
                "p1",
                redis_series("p1", "cache-b", "node-0", MetricKind::MemoryUsage, &[(at(1), 9.0)]),
            ),
    );
    let fetcher = MetricFetcher::new(backend.clone(), RetryPolicy::default(), 100_000, 100);
    let instance = redis_instance("p1", "cache-a", &["node-0"]);

    let out = fetcher.fetch_instance(&instance, window()).await.unwrap();
    assert!(out.notes.is_empty());
    assert_eq!(out.series.len(), 2);
    assert!(out.series.iter().any(|s| s.metric == MetricKind::Commands));
    // One query per Redis metric kind.
    assert_eq!(backend.calls(), MetricKind::ALL.len());
}

#[tokio::test]
async fn non_quota_errors_are_not_retried() {
    let backend = Arc::new(
        backend_with_memory().failing("p1", ReportError::Timeout("deadline".to_string())),
    );
    let fetcher = MetricFetcher::new(backend.clone(), RetryPolicy::default(), 100_000, 100);
    let instance = redis_instance("p1", "cache-a", &["node-0"]);

    let err = fetcher
        .fetch(&instance, MetricKind::MemoryUsage, window())
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::Timeout(_)));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn not_found_metric_yields_no_series() {
    let backend = Arc::new(
        FakeBackend::new().failing("p1", ReportError::NotFound("no such metric".to_string())),
    );
    let fetcher = MetricFetcher::new(backend, RetryPolicy::default(), 100_000, 100);
    let instance = redis_instance("p1", "cache-a", &["node-0"]);

    let fetched = fetcher
        .fetch(&instance, MetricKind::NetworkTraffic, window())
        .await
        .unwrap();
    assert!(fetched.series.is_empty());
    assert!(!fetched.narrowed());
}

#[tokio::test]
async fn instance_level_series_from_several_nodes_keep_the_max() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_series(
                "p1",
                redis_series(
                    "p1",
                    "cache-b",
                    "node-1",
                    MetricKind::MaxMemory,
                    &[(at(2), 100.0), (at(1), 500.0)],
                ),
            )
            .with_series(
                "p1",
                redis_series(
                    "p1",
                    "cache-b",
                    "node-2",
                    MetricKind::MaxMemory,
                    &[(at(2), 300.0), (at(1), 200.0)],
                ),
            ),
    );
    let fetcher = MetricFetcher::new(backend, RetryPolicy::default(), 100_000, 100);
    let instance = redis_instance("p1", "cache-b", &["node-0", "node-1", "node-2"]);

    let fetched = fetcher
        .fetch(&instance, MetricKind::MaxMemory, window())
        .await
        .unwrap();
    assert_eq!(fetched.series.len(), 1);
    let series = &fetched.series[0];
    assert_eq!(series.node_id, None);
    let values: Vec<(i64, f64)> = series.points.iter().map(|p| (p.timestamp, p.value)).collect();
    assert_eq!(values, vec![(at(2), 300.0), (at(1), 500.0)]);
}
