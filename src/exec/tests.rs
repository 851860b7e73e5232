use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::stats::{Reporter, SampleResult};

use super::*;

struct RecordingReporter {
    results: Mutex<Vec<SampleResult>>,
}

impl RecordingReporter {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(Vec::new()),
        })
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, result: SampleResult) {
        self.results.lock().expect("reporter lock").push(result);
    }
}

fn test_env() -> RunEnv {
    RunEnv::new(RecordingReporter::new(), reqwest::Client::new(), &[])
}

fn plain_context() -> ExecContext {
    ExecContext::new(CancellationToken::new(), 0, &test_env())
}

#[test]
fn substitute_without_markers_is_identity() {
    let ctx = plain_context();
    assert_eq!(ctx.substitute("plain text"), "plain text");
    assert_eq!(ctx.substitute(""), "");
    assert_eq!(ctx.substitute("cost is $5 {not a var}"), "cost is $5 {not a var}");
}

#[test]
fn substitute_replaces_known_variables() {
    let ctx = plain_context();
    ctx.set_var("user", "alice".to_owned());
    ctx.set_var("id", "7".to_owned());

    assert_eq!(
        ctx.substitute("hello ${user}, id=${id}!"),
        "hello alice, id=7!"
    );
}

#[test]
fn substitute_leaves_missing_variables_verbatim() {
    let ctx = plain_context();
    ctx.set_var("known", "v".to_owned());

    assert_eq!(ctx.substitute("${missing}"), "${missing}");
    assert_eq!(ctx.substitute("a ${missing} ${known}"), "a ${missing} v");
}

#[test]
fn substitute_does_not_recurse() {
    let ctx = plain_context();
    ctx.set_var("a", "${b}".to_owned());
    ctx.set_var("b", "x".to_owned());

    assert_eq!(ctx.substitute("${a}"), "${b}");
}

#[test]
fn substitute_handles_unterminated_marker() {
    let ctx = plain_context();
    ctx.set_var("a", "x".to_owned());
    assert_eq!(ctx.substitute("${a} and ${unclosed"), "x and ${unclosed");
}

#[test]
fn child_context_inherits_variables() {
    let ctx = plain_context();
    ctx.set_var("token", "t".to_owned());

    let child = ctx.child(3);
    assert_eq!(child.get_var("token").as_deref(), Some("t"));
    assert_eq!(child.thread_id(), 3);

    child.set_var("token", "changed".to_owned());
    assert_eq!(ctx.get_var("token").as_deref(), Some("t"));
}

#[test]
fn limiter_burst_is_one() {
    let limiter = RateLimiter::new(1.0);
    assert!(limiter.try_acquire());
    assert!(!limiter.try_acquire());
}

#[tokio::test(start_paused = true)]
async fn limiter_refills_at_rate() {
    let limiter = RateLimiter::new(10.0);
    assert!(limiter.try_acquire());
    assert!(!limiter.try_acquire());

    tokio::time::advance(Duration::from_millis(100)).await;
    assert!(limiter.try_acquire());
    assert!(!limiter.try_acquire());
}

#[tokio::test(start_paused = true)]
async fn limiter_blocking_acquisitions_pace_out() {
    let limiter = RateLimiter::new(10.0);
    let cancel = CancellationToken::new();

    let started = tokio::time::Instant::now();
    for _ in 0..3 {
        limiter.acquire(&cancel).await.expect("acquire");
    }
    let elapsed = started.elapsed();

    // Burst token plus two refills at 100 ms apart.
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn limiter_acquire_returns_cancelled() {
    let limiter = RateLimiter::new(0.001);
    let cancel = CancellationToken::new();
    assert!(limiter.try_acquire());

    let waiter = {
        let cancel = cancel.clone();
        tokio::spawn(async move { limiter.acquire(&cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    cancel.cancel();

    let result = waiter.await.expect("join");
    assert!(result.expect_err("should cancel").is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn limiter_set_rate_applies_to_next_acquisition() {
    let limiter = RateLimiter::new(1.0);
    assert!(limiter.try_acquire());

    limiter.set_rate(1000.0);
    assert!((limiter.rate() - 1000.0).abs() < f64::EPSILON);

    tokio::time::advance(Duration::from_millis(2)).await;
    assert!(limiter.try_acquire());
}

#[test]
fn limiter_store_returns_same_instance() {
    let store = LimiterStore::new();
    let first = store.get_or_create("Limiter_a", 5.0);
    let second = store.get_or_create("Limiter_a", 50.0);
    assert!(Arc::ptr_eq(&first, &second));
    assert!((second.rate() - 5.0).abs() < f64::EPSILON);

    let other = store.get_or_create("Limiter_b", 5.0);
    assert!(!Arc::ptr_eq(&first, &other));
}

#[test]
fn normalize_percent_covers_all_ranges() {
    assert!((normalize_profile_percent(-3.0)).abs() < f64::EPSILON);
    assert!((normalize_profile_percent(0.5) - 0.5).abs() < f64::EPSILON);
    assert!((normalize_profile_percent(1.0) - 1.0).abs() < f64::EPSILON);
    assert!((normalize_profile_percent(50.0) - 0.5).abs() < f64::EPSILON);
    assert!((normalize_profile_percent(150.0) - 1.5).abs() < f64::EPSILON);
}

#[test]
fn profile_scale_clamps_negative_writes() {
    let scale = ProfileScale::new(1.0);
    assert!((scale.get() - 1.0).abs() < f64::EPSILON);

    scale.set(-0.5);
    assert!(scale.get().abs() < f64::EPSILON);

    scale.set(0.75);
    assert!((scale.get() - 0.75).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn zero_ramp_block_holds_target_for_step() {
    let cancel = CancellationToken::new();
    let scale = Arc::new(ProfileScale::new(0.0));
    let blocks = vec![RpsProfileBlock {
        ramp_up: Duration::ZERO,
        step_duration: Duration::from_millis(1000),
        profile_percent: 50.0,
    }];

    let driver = {
        let cancel = cancel.clone();
        let scale = Arc::clone(&scale);
        tokio::spawn(async move { run_profile_blocks(&cancel, &blocks, &scale).await })
    };

    // Let the driver set the target and park in the hold sleep.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!((scale.get() - 0.5).abs() < f64::EPSILON);

    driver.await.expect("driver");
    assert!((scale.get() - 0.5).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn profile_blocks_run_sequentially() {
    let cancel = CancellationToken::new();
    let scale = Arc::new(ProfileScale::new(0.0));
    let blocks = vec![
        RpsProfileBlock {
            ramp_up: Duration::ZERO,
            step_duration: Duration::from_millis(100),
            profile_percent: 50.0,
        },
        RpsProfileBlock {
            ramp_up: Duration::ZERO,
            step_duration: Duration::from_millis(100),
            profile_percent: 100.0,
        },
    ];

    run_profile_blocks(&cancel, &blocks, &scale).await;
    assert!((scale.get() - 1.0).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn ramp_interpolates_toward_target() {
    let cancel = CancellationToken::new();
    let scale = Arc::new(ProfileScale::new(0.0));
    let blocks = vec![RpsProfileBlock {
        ramp_up: Duration::from_millis(1000),
        step_duration: Duration::from_millis(100),
        profile_percent: 100.0,
    }];

    let driver = {
        let cancel = cancel.clone();
        let scale = Arc::clone(&scale);
        tokio::spawn(async move { run_profile_blocks(&cancel, &blocks, &scale).await })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;
    let mid = scale.get();
    assert!(mid > 0.2 && mid < 0.8, "mid-ramp scale was {mid}");

    driver.await.expect("driver");
    assert!((scale.get() - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn rate_gate_unlimited_when_no_rate_configured() {
    let ctx = plain_context();
    let gate = ctx.rate_gate("s1", 0.0).await.expect("gate");
    assert_eq!(gate, RateGate::Proceed);
}

#[tokio::test]
async fn rate_gate_skips_when_profile_scale_is_zero() {
    let env = test_env();
    let rate = RateControl {
        default_rps: 10.0,
        non_blocking: true,
        profile_scale: Some(Arc::new(ProfileScale::new(0.0))),
        shared_limiters: Some(Arc::new(LimiterStore::new())),
    };
    let ctx = ExecContext::with_rate(CancellationToken::new(), 0, &env, rate);

    let gate = ctx.rate_gate("s1", 0.0).await.expect("gate");
    assert_eq!(gate, RateGate::Skip);
}

#[tokio::test]
async fn rate_gate_non_blocking_skips_once_burst_is_spent() {
    let env = test_env();
    let rate = RateControl {
        default_rps: 0.5,
        non_blocking: true,
        profile_scale: None,
        shared_limiters: Some(Arc::new(LimiterStore::new())),
    };
    let ctx = ExecContext::with_rate(CancellationToken::new(), 0, &env, rate);

    assert_eq!(ctx.rate_gate("s1", 0.0).await.expect("gate"), RateGate::Proceed);
    assert_eq!(ctx.rate_gate("s1", 0.0).await.expect("gate"), RateGate::Skip);
}

#[tokio::test]
async fn rate_gate_prefers_sampler_target_over_default() {
    let env = test_env();
    let rate = RateControl {
        default_rps: 1000.0,
        non_blocking: true,
        profile_scale: None,
        shared_limiters: Some(Arc::new(LimiterStore::new())),
    };
    let ctx = ExecContext::with_rate(CancellationToken::new(), 0, &env, rate);

    ctx.rate_gate("s1", 2.0).await.expect("gate");
    let limiter = ctx.limiter_for("s1", 2.0);
    assert!((limiter.rate() - 2.0).abs() < f64::EPSILON);
}
