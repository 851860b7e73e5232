use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::exec::{
    run_profile_blocks, wait_for_duration, ExecContext, LimiterStore, ProfileScale, RateControl,
    RpsProfileBlock, RunEnv,
};
use crate::plan::{
    as_float, as_int, enabled_children, ElementBase, Serializable, TestElement, ThreadGroup,
};

/// Thread group running a fixed number of iterations per worker, with an
/// optional ramp-up spreading worker starts over time.
pub struct SimpleThreadGroup {
    base: ElementBase,
    users: usize,
    /// `-1` iterates until cancellation.
    iterations: i64,
    ramp_up: Duration,
}

impl SimpleThreadGroup {
    #[must_use]
    pub fn new(name: &str, users: usize, iterations: i64) -> Self {
        Self {
            base: ElementBase::new(name),
            users,
            iterations,
            ramp_up: Duration::ZERO,
        }
    }

    pub fn set_ramp_up(&mut self, ramp_up: Duration) {
        self.ramp_up = ramp_up;
    }

    pub fn factory(name: &str, props: &Map<String, Value>) -> Box<dyn TestElement> {
        Box::new(Self {
            base: ElementBase::new(name),
            users: as_int(props, "Users", 1).max(1) as usize,
            iterations: as_int(props, "Iterations", 1),
            ramp_up: Duration::from_millis(as_int(props, "RampUpMS", 0).max(0) as u64),
        })
    }
}

impl TestElement for SimpleThreadGroup {
    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn clone_element(&self) -> Arc<dyn TestElement> {
        Arc::new(Self {
            base: self.base.clone_base(),
            users: self.users,
            iterations: self.iterations,
            ramp_up: self.ramp_up,
        })
    }

    fn as_thread_group(&self) -> Option<&dyn ThreadGroup> {
        Some(self)
    }

    fn as_serializable(&self) -> Option<&dyn Serializable> {
        Some(self)
    }
}

impl Serializable for SimpleThreadGroup {
    fn type_tag(&self) -> &'static str {
        "SimpleThreadGroup"
    }

    fn props(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("Users".to_owned(), json!(self.users));
        props.insert("Iterations".to_owned(), json!(self.iterations));
        props.insert("RampUpMS".to_owned(), json!(self.ramp_up.as_millis() as u64));
        props
    }
}

#[async_trait]
impl ThreadGroup for SimpleThreadGroup {
    async fn start(&self, cancel: CancellationToken, env: RunEnv) {
        let ramp_step = if self.users > 1 && !self.ramp_up.is_zero() {
            self.ramp_up / (self.users as u32 - 1)
        } else {
            Duration::ZERO
        };

        let mut workers = JoinSet::new();
        for thread_id in 0..self.users {
            if thread_id > 0 && !ramp_step.is_zero() {
                // Cancelled mid-ramp: the remaining workers never start.
                if !wait_for_duration(&cancel, ramp_step).await {
                    continue;
                }
            }

            let children = enabled_children(self);
            let cancel = cancel.clone();
            let env = env.clone();
            let iterations = self.iterations;

            workers.spawn(async move {
                let ctx = ExecContext::new(cancel.clone(), thread_id, &env);

                let mut iteration = 0i64;
                while iterations == -1 || iteration < iterations {
                    if cancel.is_cancelled() {
                        return;
                    }
                    ctx.set_iteration(iteration.unsigned_abs());

                    for child in &children {
                        let Some(executable) = child.as_executable() else {
                            continue;
                        };
                        if let Err(err) = executable.execute(&ctx).await {
                            if err.is_cancelled() {
                                return;
                            }
                        }
                    }

                    iteration = iteration.saturating_add(1);
                }
            });
        }

        while workers.join_next().await.is_some() {}
    }
}

/// Thread group shaping sampler throughput to a time-segmented intensity
/// profile. Workers spin over the subtree with non-blocking shared
/// limiters; a driver task walks the profile blocks and raises or lowers
/// the scale every sampler observes.
pub struct RpsThreadGroup {
    base: ElementBase,
    users: usize,
    /// Base rate published to samplers with a zero target.
    rps: f64,
    profile_blocks: Vec<RpsProfileBlock>,
    graceful_shutdown: Duration,
}

impl RpsThreadGroup {
    #[must_use]
    pub fn new(name: &str, rps: f64) -> Self {
        Self {
            base: ElementBase::new(name),
            users: 10,
            rps,
            profile_blocks: vec![RpsProfileBlock {
                ramp_up: Duration::ZERO,
                step_duration: Duration::from_secs(60),
                profile_percent: 100.0,
            }],
            graceful_shutdown: Duration::ZERO,
        }
    }

    pub fn set_users(&mut self, users: usize) {
        self.users = users;
    }

    pub fn set_profile_blocks(&mut self, profile_blocks: Vec<RpsProfileBlock>) {
        self.profile_blocks = profile_blocks;
    }

    pub fn set_graceful_shutdown(&mut self, graceful_shutdown: Duration) {
        self.graceful_shutdown = graceful_shutdown;
    }

    pub fn factory(name: &str, props: &Map<String, Value>) -> Box<dyn TestElement> {
        Box::new(Self {
            base: ElementBase::new(name),
            users: as_int(props, "Users", 10).max(1) as usize,
            rps: as_float(props, "RPS", 10.0),
            profile_blocks: parse_profile_blocks(props),
            graceful_shutdown: Duration::from_millis(
                as_int(props, "GracefulShutdownMS", 0).max(0) as u64,
            ),
        })
    }
}

impl TestElement for RpsThreadGroup {
    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn clone_element(&self) -> Arc<dyn TestElement> {
        Arc::new(Self {
            base: self.base.clone_base(),
            users: self.users,
            rps: self.rps,
            profile_blocks: self.profile_blocks.clone(),
            graceful_shutdown: self.graceful_shutdown,
        })
    }

    fn as_thread_group(&self) -> Option<&dyn ThreadGroup> {
        Some(self)
    }

    fn as_serializable(&self) -> Option<&dyn Serializable> {
        Some(self)
    }
}

impl Serializable for RpsThreadGroup {
    fn type_tag(&self) -> &'static str {
        "RPSThreadGroup"
    }

    fn props(&self) -> Map<String, Value> {
        let blocks: Vec<Value> = self
            .profile_blocks
            .iter()
            .map(|block| {
                json!({
                    "RampUpMS": block.ramp_up.as_millis() as u64,
                    "StepDurationMS": block.step_duration.as_millis() as u64,
                    "ProfilePercent": block.profile_percent,
                })
            })
            .collect();

        let mut props = Map::new();
        props.insert("Users".to_owned(), json!(self.users));
        props.insert("RPS".to_owned(), json!(self.rps));
        props.insert("ProfileBlocks".to_owned(), Value::Array(blocks));
        props.insert(
            "GracefulShutdownMS".to_owned(),
            json!(self.graceful_shutdown.as_millis() as u64),
        );
        props
    }
}

#[async_trait]
impl ThreadGroup for RpsThreadGroup {
    async fn start(&self, cancel: CancellationToken, env: RunEnv) {
        let group = cancel.child_token();
        let shared_limiters = Arc::new(LimiterStore::new());
        // With blocks configured, workers idle at scale zero until the
        // driver raises it.
        let profile_scale = Arc::new(ProfileScale::new(if self.profile_blocks.is_empty() {
            1.0
        } else {
            0.0
        }));
        let stop_requested = CancellationToken::new();

        let driver = tokio::spawn({
            let group = group.clone();
            let stop_requested = stop_requested.clone();
            let profile_scale = Arc::clone(&profile_scale);
            let blocks = self.profile_blocks.clone();
            let graceful_shutdown = self.graceful_shutdown;
            async move {
                if blocks.is_empty() {
                    stop_requested.cancel();
                    group.cancel();
                    return;
                }

                run_profile_blocks(&group, &blocks, &profile_scale).await;
                stop_requested.cancel();
                if !graceful_shutdown.is_zero() {
                    let _ = wait_for_duration(&group, graceful_shutdown).await;
                }
                group.cancel();
            }
        });

        let mut workers = JoinSet::new();
        for thread_id in 0..self.users {
            let children = enabled_children(self);
            let group = group.clone();
            let stop_requested = stop_requested.clone();
            let env = env.clone();
            let rate = RateControl {
                default_rps: self.rps,
                non_blocking: true,
                profile_scale: Some(Arc::clone(&profile_scale)),
                shared_limiters: Some(Arc::clone(&shared_limiters)),
            };

            workers.spawn(async move {
                let ctx = ExecContext::with_rate(group.clone(), thread_id, &env, rate);

                loop {
                    if group.is_cancelled() || stop_requested.is_cancelled() {
                        return;
                    }
                    tokio::task::yield_now().await;

                    for child in &children {
                        let Some(executable) = child.as_executable() else {
                            continue;
                        };
                        if let Err(err) = executable.execute(&ctx).await {
                            if err.is_cancelled() || group.is_cancelled() {
                                return;
                            }
                        }
                    }
                }
            });
        }

        while workers.join_next().await.is_some() {}
        group.cancel();
        let _ = driver.await;
    }
}

fn parse_profile_blocks(props: &Map<String, Value>) -> Vec<RpsProfileBlock> {
    let Some(raw) = props.get("ProfileBlocks") else {
        // Legacy plans carried a flat duration instead of blocks.
        let legacy_ms = as_int(props, "DurationMS", 0);
        if legacy_ms > 0 {
            return vec![RpsProfileBlock {
                ramp_up: Duration::ZERO,
                step_duration: Duration::from_millis(legacy_ms as u64),
                profile_percent: 100.0,
            }];
        }
        return Vec::new();
    };

    let Value::Array(items) = raw else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let Value::Object(block) = item else {
                return None;
            };
            Some(RpsProfileBlock {
                ramp_up: Duration::from_millis(as_int(block, "RampUpMS", 0).max(0) as u64),
                step_duration: Duration::from_millis(
                    as_int(block, "StepDurationMS", 0).max(0) as u64,
                ),
                profile_percent: as_float(block, "ProfilePercent", 100.0),
            })
        })
        .collect()
}
