use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::types::{Metric, Reporter, SampleResult, TOTAL_KEY};

pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Callback invoked with a copy of each published snapshot.
pub type UpdateCallback = Box<dyn Fn(&HashMap<String, Metric>) + Send + Sync>;

/// Thread-safe aggregator of sampler results.
///
/// Reports accumulate under a single lock into interval and cumulative
/// counters; a ticker task summarizes the interval into a snapshot every
/// `report_interval` and resets the interval state under the same lock, so
/// each report lands in exactly one window.
pub struct StatsAggregator {
    state: Mutex<AggState>,
    report_interval: Duration,
    on_update: Option<UpdateCallback>,
}

struct AggState {
    interval_counts: HashMap<String, u64>,
    interval_errors: HashMap<String, u64>,
    interval_latency: HashMap<String, Duration>,
    total_counts: HashMap<String, u64>,
    total_errors: HashMap<String, u64>,
    known_samplers: HashSet<String>,
    latest: HashMap<String, Metric>,
}

impl AggState {
    fn new() -> Self {
        let mut latest = HashMap::new();
        latest.insert(TOTAL_KEY.to_owned(), Metric::default());
        Self {
            interval_counts: HashMap::new(),
            interval_errors: HashMap::new(),
            interval_latency: HashMap::new(),
            total_counts: HashMap::new(),
            total_errors: HashMap::new(),
            known_samplers: HashSet::new(),
            latest,
        }
    }
}

impl StatsAggregator {
    /// Creates the aggregator and starts its ticker task, which runs until
    /// `cancel` fires.
    #[must_use]
    pub fn spawn(
        cancel: CancellationToken,
        report_interval: Duration,
        on_update: Option<UpdateCallback>,
    ) -> Arc<Self> {
        let aggregator = Arc::new(Self {
            state: Mutex::new(AggState::new()),
            report_interval,
            on_update,
        });

        let ticker_ref = Arc::clone(&aggregator);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ticker_ref.report_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; the window starts now.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                ticker_ref.publish_interval_snapshot();
            }

            // Wind-down: flush samples reported since the last tick, then
            // publish one empty window so per-interval rates settle to zero
            // while cumulative totals stay visible.
            ticker_ref.publish_interval_snapshot();
            tokio::time::sleep(ticker_ref.report_interval).await;
            ticker_ref.publish_interval_snapshot();
        });

        aggregator
    }

    /// Copy of the latest published snapshot; always contains `"Total"`.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Metric> {
        let state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut out = state.latest.clone();
        out.entry(TOTAL_KEY.to_owned()).or_default();
        out
    }

    pub(crate) fn publish_interval_snapshot(&self) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut window_seconds = self.report_interval.as_secs_f64();
        if window_seconds <= 0.0 {
            window_seconds = 1.0;
        }

        let mut data = HashMap::with_capacity(state.known_samplers.len() + 1);

        let mut total_interval_count = 0u64;
        let mut total_interval_errors = 0u64;
        let mut total_interval_latency = Duration::ZERO;
        let mut total_request_count = 0u64;
        let mut total_error_count = 0u64;

        for sampler in &state.known_samplers {
            let interval_count = state.interval_counts.get(sampler).copied().unwrap_or(0);
            let interval_errors = state.interval_errors.get(sampler).copied().unwrap_or(0);
            let interval_latency = state
                .interval_latency
                .get(sampler)
                .copied()
                .unwrap_or(Duration::ZERO);

            let total_count = state.total_counts.get(sampler).copied().unwrap_or(0);
            let total_errors = state.total_errors.get(sampler).copied().unwrap_or(0);

            total_interval_count = total_interval_count.saturating_add(interval_count);
            total_interval_errors = total_interval_errors.saturating_add(interval_errors);
            total_interval_latency = total_interval_latency.saturating_add(interval_latency);
            total_request_count = total_request_count.saturating_add(total_count);
            total_error_count = total_error_count.saturating_add(total_errors);

            data.insert(
                sampler.clone(),
                Metric {
                    rps: interval_count as f64 / window_seconds,
                    avg_latency_ms: average_latency_ms(interval_latency, interval_count),
                    errors: interval_errors,
                    total_requests: total_count,
                    total_errors,
                },
            );
        }

        data.insert(
            TOTAL_KEY.to_owned(),
            Metric {
                rps: total_interval_count as f64 / window_seconds,
                avg_latency_ms: average_latency_ms(total_interval_latency, total_interval_count),
                errors: total_interval_errors,
                total_requests: total_request_count,
                total_errors: total_error_count,
            },
        );

        state.latest = data;
        state.interval_counts.clear();
        state.interval_errors.clear();
        state.interval_latency.clear();

        if let Some(on_update) = self.on_update.as_ref() {
            let copy = state.latest.clone();
            drop(state);
            on_update(&copy);
        }
    }
}

impl Reporter for StatsAggregator {
    fn report(&self, result: SampleResult) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        let name = result.sampler_name;
        if !state.known_samplers.contains(&name) {
            state.known_samplers.insert(name.clone());
        }

        let duration = result
            .end_time
            .duration_since(result.start_time)
            .unwrap_or_default();

        *state.interval_counts.entry(name.clone()).or_insert(0) += 1;
        *state
            .interval_latency
            .entry(name.clone())
            .or_insert(Duration::ZERO) += duration;
        *state.total_counts.entry(name.clone()).or_insert(0) += 1;

        if !result.success || result.error.is_some() {
            *state.interval_errors.entry(name.clone()).or_insert(0) += 1;
            *state.total_errors.entry(name).or_insert(0) += 1;
        }
    }
}

fn average_latency_ms(latency_sum: Duration, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    latency_sum.as_millis() as f64 / count as f64
}
