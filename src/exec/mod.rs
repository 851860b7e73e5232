//! Execution engine: per-worker contexts, rate limiting, intensity profile
//! state, and the top-level plan runner.

mod context;
mod limiter;
mod profile;
mod runner;

#[cfg(test)]
mod tests;

pub use context::{ExecContext, RateControl, RateGate, RunEnv};
pub use limiter::{LimiterStore, RateLimiter};
pub use profile::{
    normalize_profile_percent, run_profile_blocks, wait_for_duration, ProfileScale,
    RpsProfileBlock, PROFILE_STEP,
};
pub use runner::run_plan;
