use std::time::{Duration, SystemTime};

/// Key of the synthesized sum aggregate, always present in snapshots.
pub const TOTAL_KEY: &str = "Total";

/// Outcome of one sampler execution.
#[derive(Debug, Clone)]
pub struct SampleResult {
    pub sampler_name: String,
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    pub latency: Duration,
    /// Textual status, e.g. "200 OK". Empty on transport failure.
    pub response_code: String,
    pub success: bool,
    pub error: Option<String>,
    pub bytes_received: u64,
}

impl SampleResult {
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end_time
            .duration_since(self.start_time)
            .unwrap_or_default()
    }
}

/// Published metrics for one sampler over the latest window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metric {
    pub rps: f64,
    pub avg_latency_ms: f64,
    /// Errors in the latest window.
    pub errors: u64,
    /// Cumulative requests since run start.
    pub total_requests: u64,
    /// Cumulative errors since run start.
    pub total_errors: u64,
}

/// Sink for sampler results, held by every execution context.
pub trait Reporter: Send + Sync {
    fn report(&self, result: SampleResult);
}
