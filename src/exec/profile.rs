use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Granularity of ramp interpolation in the profile driver.
pub const PROFILE_STEP: Duration = Duration::from_millis(100);

/// One segment of a rate-profile schedule: ramp linearly to the target
/// intensity, then hold it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RpsProfileBlock {
    pub ramp_up: Duration,
    pub step_duration: Duration,
    /// Values > 1 are percent, values in (0, 1] are fractions.
    pub profile_percent: f64,
}

/// Lock-free intensity multiplier observed by samplers. Stores f64 bits in
/// an atomic; negative writes clamp to zero.
pub struct ProfileScale {
    bits: AtomicU64,
}

impl ProfileScale {
    #[must_use]
    pub fn new(initial: f64) -> Self {
        let scale = Self {
            bits: AtomicU64::new(0),
        };
        scale.set(initial);
        scale
    }

    pub fn set(&self, value: f64) {
        let clamped = if value < 0.0 { 0.0 } else { value };
        self.bits.store(clamped.to_bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Normalizes a profile percent: negatives clamp to 0, values in (0, 1]
/// pass through as fractions, values above 1 are divided by 100.
#[must_use]
pub fn normalize_profile_percent(percent: f64) -> f64 {
    if percent < 0.0 {
        return 0.0;
    }
    if percent > 1.0 {
        return percent / 100.0;
    }
    percent
}

/// Walks the profile blocks sequentially, interpolating `scale` during each
/// ramp and holding it for each step. Returns early when `cancel` fires.
pub async fn run_profile_blocks(
    cancel: &CancellationToken,
    blocks: &[RpsProfileBlock],
    scale: &ProfileScale,
) {
    let mut current = 0.0;
    scale.set(current);

    for block in blocks {
        let target = normalize_profile_percent(block.profile_percent);

        if !block.ramp_up.is_zero() {
            let start = Instant::now();
            loop {
                let elapsed = start.elapsed();
                if elapsed >= block.ramp_up {
                    break;
                }

                let progress = elapsed.as_secs_f64() / block.ramp_up.as_secs_f64();
                scale.set(current + (target - current) * progress);

                let remaining = block.ramp_up.saturating_sub(elapsed);
                let wait_step = PROFILE_STEP.min(remaining);
                if !wait_for_duration(cancel, wait_step).await {
                    return;
                }
            }
        }

        scale.set(target);
        if !wait_for_duration(cancel, block.step_duration).await {
            return;
        }

        current = target;
    }
}

/// Sleeps for `duration` unless `cancel` fires first; returns whether the
/// full duration elapsed.
pub async fn wait_for_duration(cancel: &CancellationToken, duration: Duration) -> bool {
    if duration.is_zero() {
        return true;
    }
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}
