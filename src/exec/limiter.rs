use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ExecError;

/// Token bucket with a burst of one and a dynamically adjustable rate.
///
/// Starts with a full bucket so the first acquisition never waits. A
/// `set_rate` settles the accrued fraction at the old rate before switching,
/// and takes effect on the next acquisition.
pub struct RateLimiter {
    state: Mutex<LimiterState>,
}

struct LimiterState {
    rate: f64,
    tokens: f64,
    updated: Instant,
}

impl RateLimiter {
    #[must_use]
    pub fn new(rate: f64) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                rate,
                tokens: 1.0,
                updated: Instant::now(),
            }),
        }
    }

    /// Non-blocking acquisition; `false` means "skip this execution".
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        refill(&mut state, Instant::now());
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return true;
        }
        false
    }

    /// Waits until a token is available or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Cancelled`] when cancelled while waiting.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), ExecError> {
        loop {
            let wait = {
                let mut state = self.lock();
                refill(&mut state, Instant::now());
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                if state.rate > 0.0 {
                    Duration::from_secs_f64(((1.0 - state.tokens) / state.rate).max(0.0))
                } else {
                    // No tokens will accrue until set_rate raises the rate.
                    Duration::from_millis(100)
                }
            };

            tokio::select! {
                () = cancel.cancelled() => return Err(ExecError::Cancelled),
                () = tokio::time::sleep(wait) => {}
            }
        }
    }

    pub fn set_rate(&self, rate: f64) {
        let mut state = self.lock();
        refill(&mut state, Instant::now());
        state.rate = rate;
    }

    #[must_use]
    pub fn rate(&self) -> f64 {
        self.lock().rate
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LimiterState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn refill(state: &mut LimiterState, now: Instant) {
    if state.rate > 0.0 {
        let elapsed = now.saturating_duration_since(state.updated).as_secs_f64();
        state.tokens = (state.tokens + elapsed * state.rate).min(1.0);
    }
    state.updated = now;
}

/// Concurrent collection of limiters keyed by sampler id, shared across a
/// thread group's workers.
#[derive(Default)]
pub struct LimiterStore {
    limiters: Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl LimiterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic get-or-create; an existing limiter keeps its current rate.
    pub fn get_or_create(&self, key: &str, rate: f64) -> Arc<RateLimiter> {
        let mut limiters = match self.limiters.lock() {
            Ok(limiters) => limiters,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            limiters
                .entry(key.to_owned())
                .or_insert_with(|| Arc::new(RateLimiter::new(rate))),
        )
    }
}
