//! Sample aggregation: converts per-request reports into time-bucketed
//! per-sampler metrics published on a fixed cadence.

mod aggregator;
mod types;

#[cfg(test)]
mod tests;

pub use aggregator::{StatsAggregator, UpdateCallback, DEFAULT_REPORT_INTERVAL};
pub use types::{Metric, Reporter, SampleResult, TOTAL_KEY};
