use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;

use super::*;

fn sample(name: &str, latency_ms: u64, success: bool) -> SampleResult {
    let start = SystemTime::now();
    SampleResult {
        sampler_name: name.to_owned(),
        start_time: start,
        end_time: start + Duration::from_millis(latency_ms),
        latency: Duration::from_millis(latency_ms),
        response_code: if success { "200 OK" } else { "500 Internal Server Error" }.to_owned(),
        success,
        error: None,
        bytes_received: 10,
    }
}

fn fresh_aggregator() -> std::sync::Arc<StatsAggregator> {
    // The token is cancelled right away so the ticker exits; publishing is
    // driven manually in these tests.
    let cancel = CancellationToken::new();
    cancel.cancel();
    StatsAggregator::spawn(cancel, Duration::from_secs(1), None)
}

#[tokio::test]
async fn snapshot_always_contains_total() {
    let aggregator = fresh_aggregator();
    let snapshot = aggregator.snapshot();
    assert!(snapshot.contains_key(TOTAL_KEY));
    assert_eq!(snapshot[TOTAL_KEY], Metric::default());
}

#[tokio::test]
async fn publish_summarizes_interval_and_totals() {
    let aggregator = fresh_aggregator();

    aggregator.report(sample("a", 100, true));
    aggregator.report(sample("a", 300, true));
    aggregator.report(sample("b", 50, false));
    aggregator.publish_interval_snapshot();

    let snapshot = aggregator.snapshot();
    let a = snapshot.get("a").expect("sampler a");
    assert!((a.rps - 2.0).abs() < f64::EPSILON);
    assert!((a.avg_latency_ms - 200.0).abs() < f64::EPSILON);
    assert_eq!(a.errors, 0);
    assert_eq!(a.total_requests, 2);
    assert_eq!(a.total_errors, 0);

    let b = snapshot.get("b").expect("sampler b");
    assert_eq!(b.errors, 1);
    assert_eq!(b.total_errors, 1);

    let total = snapshot.get(TOTAL_KEY).expect("total");
    assert!((total.rps - 3.0).abs() < f64::EPSILON);
    assert_eq!(total.total_requests, 3);
    assert_eq!(total.errors, 1);
    assert_eq!(total.total_errors, 1);
}

#[tokio::test]
async fn total_always_sums_per_sampler_entries() {
    let aggregator = fresh_aggregator();

    for _ in 0..5 {
        aggregator.report(sample("a", 10, true));
    }
    for _ in 0..3 {
        aggregator.report(sample("b", 10, false));
    }
    aggregator.publish_interval_snapshot();

    let snapshot = aggregator.snapshot();
    let sum_errors: u64 = snapshot
        .iter()
        .filter(|(name, _)| name.as_str() != TOTAL_KEY)
        .map(|(_, metric)| metric.errors)
        .sum();
    let sum_total_errors: u64 = snapshot
        .iter()
        .filter(|(name, _)| name.as_str() != TOTAL_KEY)
        .map(|(_, metric)| metric.total_errors)
        .sum();
    let sum_requests: u64 = snapshot
        .iter()
        .filter(|(name, _)| name.as_str() != TOTAL_KEY)
        .map(|(_, metric)| metric.total_requests)
        .sum();

    let total = snapshot.get(TOTAL_KEY).expect("total");
    assert_eq!(total.errors, sum_errors);
    assert_eq!(total.total_errors, sum_total_errors);
    assert_eq!(total.total_requests, sum_requests);
}

#[tokio::test]
async fn interval_resets_but_totals_accumulate() {
    let aggregator = fresh_aggregator();

    aggregator.report(sample("a", 100, true));
    aggregator.publish_interval_snapshot();

    aggregator.report(sample("a", 100, true));
    aggregator.report(sample("a", 100, true));
    aggregator.publish_interval_snapshot();

    let snapshot = aggregator.snapshot();
    let a = snapshot.get("a").expect("sampler a");
    assert!((a.rps - 2.0).abs() < f64::EPSILON);
    assert_eq!(a.total_requests, 3);

    // An empty window keeps the sampler visible with zero rates.
    aggregator.publish_interval_snapshot();
    let snapshot = aggregator.snapshot();
    let a = snapshot.get("a").expect("sampler a");
    assert!(a.rps.abs() < f64::EPSILON);
    assert!(a.avg_latency_ms.abs() < f64::EPSILON);
    assert_eq!(a.total_requests, 3);
}

#[tokio::test]
async fn error_detection_covers_flag_and_error_field() {
    let aggregator = fresh_aggregator();

    let mut with_error = sample("a", 10, true);
    with_error.error = Some("boom".to_owned());
    aggregator.report(with_error);
    aggregator.report(sample("a", 10, false));
    aggregator.report(sample("a", 10, true));
    aggregator.publish_interval_snapshot();

    let snapshot = aggregator.snapshot();
    let a = snapshot.get("a").expect("sampler a");
    assert_eq!(a.errors, 2);
    assert_eq!(a.total_requests, 3);
}

#[tokio::test]
async fn on_update_receives_a_copy() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let (tx, rx) = std::sync::mpsc::channel();
    let aggregator = StatsAggregator::spawn(
        cancel,
        Duration::from_secs(1),
        Some(Box::new(move |data| {
            let _ = tx.send(data.len());
        })),
    );

    aggregator.report(sample("a", 10, true));
    aggregator.publish_interval_snapshot();

    let entries = rx.recv_timeout(Duration::from_secs(1)).expect("callback");
    assert_eq!(entries, 2);
}

#[tokio::test(start_paused = true)]
async fn ticker_flushes_and_settles_after_cancellation() {
    let cancel = CancellationToken::new();
    let aggregator = StatsAggregator::spawn(cancel.clone(), Duration::from_millis(100), None);

    aggregator.report(sample("a", 10, true));
    tokio::time::sleep(Duration::from_millis(150)).await;

    let snapshot = aggregator.snapshot();
    assert_eq!(snapshot.get("a").expect("sampler a").total_requests, 1);

    aggregator.report(sample("a", 10, true));
    cancel.cancel();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let snapshot = aggregator.snapshot();
    let a = snapshot.get("a").expect("sampler a");
    assert_eq!(a.total_requests, 2);
    assert!(a.rps.abs() < f64::EPSILON);
}
