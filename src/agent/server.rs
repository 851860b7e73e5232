use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::exec::{run_plan, RunEnv};
use crate::host::HostMetricsCollector;
use crate::plan::TestElement;
use crate::stats::{Metric, Reporter, StatsAggregator, DEFAULT_REPORT_INTERVAL, TOTAL_KEY};

const DEBUG_CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Behavior switches for one agent instance.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    pub enable_remote_restart: bool,
    pub restart_token: String,
    pub restart_command: String,
}

impl From<&AgentConfig> for ServerOptions {
    fn from(config: &AgentConfig) -> Self {
        Self {
            enable_remote_restart: config.enable_remote_restart,
            restart_token: config.remote_restart_token.clone(),
            restart_command: config.remote_restart_command.clone(),
        }
    }
}

/// Agent core behind the HTTP handlers. A single mutex guards the
/// running flag, the current run's cancel handle, and its aggregator.
pub struct AgentServer {
    run: Mutex<RunState>,
    sampler_client: reqwest::Client,
    debug_client: reqwest::Client,
    host_stats: HostMetricsCollector,
    pub(super) enable_remote_restart: bool,
    pub(super) restart_token: String,
    pub(super) restart_command: String,
}

#[derive(Default)]
struct RunState {
    running: bool,
    cancel: Option<CancellationToken>,
    stats: Option<Arc<StatsAggregator>>,
    plan_name: String,
}

impl AgentServer {
    #[must_use]
    pub fn new(options: ServerOptions) -> Arc<Self> {
        Arc::new(Self {
            run: Mutex::new(RunState::default()),
            sampler_client: reqwest::Client::new(),
            debug_client: reqwest::Client::builder()
                .timeout(DEBUG_CLIENT_TIMEOUT)
                .build()
                .unwrap_or_default(),
            host_stats: HostMetricsCollector::new(),
            enable_remote_restart: options.enable_remote_restart,
            restart_token: options.restart_token.trim().to_owned(),
            restart_command: options.restart_command.trim().to_owned(),
        })
    }

    /// Starts a plan run. Only the root's enabled thread-group children are
    /// started; everything else at the root is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AlreadyRunning`] while a run is in flight.
    pub fn start(self: &Arc<Self>, plan: Arc<dyn TestElement>) -> Result<(), AgentError> {
        let plan_name = normalize_plan_name(plan.name());

        let (cancel, stats) = {
            let mut state = self.lock_run();
            if state.running {
                return Err(AgentError::AlreadyRunning);
            }

            let cancel = CancellationToken::new();
            let stats = StatsAggregator::spawn(cancel.clone(), DEFAULT_REPORT_INTERVAL, None);
            state.running = true;
            state.cancel = Some(cancel.clone());
            state.stats = Some(Arc::clone(&stats));
            state.plan_name = plan_name.clone();
            (cancel, stats)
        };

        info!("test started: plan={:?}", plan_name);

        let reporter: Arc<dyn Reporter> = stats.clone() as Arc<dyn Reporter>;
        let env = RunEnv::new(reporter, self.sampler_client.clone(), plan.parameters());

        let server = Arc::clone(self);
        tokio::spawn(async move {
            run_plan(&cancel, plan.as_ref(), &env).await;
            // Natural completion winds down the aggregator and any
            // ancillary tasks through the same cancel handle.
            cancel.cancel();
            server.set_stopped(&stats);
        });

        Ok(())
    }

    /// Cancels the current run, if any. Returns whether one was running and
    /// its plan name.
    pub fn stop(&self) -> (bool, String) {
        let (was_running, plan_name, cancel) = {
            let mut state = self.lock_run();
            let was_running = state.running;
            let plan_name = std::mem::take(&mut state.plan_name);
            let cancel = state.cancel.take();
            state.running = false;
            // The aggregator stays behind so `/metrics` keeps serving the
            // final snapshot until the next run replaces it.
            (was_running, plan_name, cancel)
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        (was_running, plan_name)
    }

    /// Running flag plus a copy of the latest metrics snapshot.
    #[must_use]
    pub fn snapshot(&self) -> (bool, HashMap<String, Metric>) {
        let (running, stats) = {
            let state = self.lock_run();
            (state.running, state.stats.clone())
        };

        match stats {
            Some(stats) => (running, stats.snapshot()),
            None => {
                let mut empty = HashMap::new();
                empty.insert(TOTAL_KEY.to_owned(), Metric::default());
                (running, empty)
            }
        }
    }

    pub(super) fn host_snapshot(&self) -> crate::host::HostMetricsSnapshot {
        self.host_stats.collect()
    }

    pub(super) fn debug_client(&self) -> &reqwest::Client {
        &self.debug_client
    }

    /// Marks the run stopped only if `stats` is still the current
    /// aggregator; a newer run keeps its own state.
    fn set_stopped(&self, stats: &Arc<StatsAggregator>) {
        let mut state = self.lock_run();
        let same = state
            .stats
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, stats));
        if !same {
            return;
        }

        let plan_name = std::mem::take(&mut state.plan_name);
        state.running = false;
        state.cancel = None;
        if !plan_name.is_empty() {
            info!("test completed: plan={:?}", plan_name);
        }
    }

    fn lock_run(&self) -> std::sync::MutexGuard<'_, RunState> {
        match self.run.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub(super) fn normalize_plan_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        "unnamed-plan".to_owned()
    } else {
        trimmed.to_owned()
    }
}
