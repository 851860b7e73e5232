use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio_util::sync::CancellationToken;

use crate::error::ExecError;
use crate::plan::Parameter;
use crate::stats::{Reporter, SampleResult};

use super::limiter::{LimiterStore, RateLimiter};
use super::profile::ProfileScale;

/// Shared environment a run hands to every thread group: the result sink,
/// the HTTP client for samplers, and the plan's parameter definitions.
#[derive(Clone)]
pub struct RunEnv {
    pub reporter: Arc<dyn Reporter>,
    pub http: reqwest::Client,
    pub params: Arc<HashMap<String, Parameter>>,
}

impl RunEnv {
    #[must_use]
    pub fn new(
        reporter: Arc<dyn Reporter>,
        http: reqwest::Client,
        parameters: &[Parameter],
    ) -> Self {
        let params = parameters
            .iter()
            .map(|param| (param.name.clone(), param.clone()))
            .collect();
        Self {
            reporter,
            http,
            params: Arc::new(params),
        }
    }
}

/// Rate-control block a thread group seeds into its workers' contexts.
#[derive(Clone)]
pub struct RateControl {
    /// Base rate applied to samplers whose own target is zero.
    pub default_rps: f64,
    /// Non-blocking acquisition: a refused token skips the execution
    /// instead of stalling the worker.
    pub non_blocking: bool,
    pub profile_scale: Option<Arc<ProfileScale>>,
    pub shared_limiters: Option<Arc<LimiterStore>>,
}

impl Default for RateControl {
    fn default() -> Self {
        Self {
            default_rps: 0.0,
            non_blocking: false,
            profile_scale: None,
            shared_limiters: None,
        }
    }
}

/// Outcome of the rate gate ahead of a sampler execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateGate {
    Proceed,
    /// This invocation becomes a no-op.
    Skip,
}

/// Per-worker execution state: the cancellable lifetime, variables,
/// parameter definitions, and the seams into the reporting and
/// rate-control subsystems.
pub struct ExecContext {
    cancel: CancellationToken,
    thread_id: usize,
    iteration: AtomicU64,
    vars: RwLock<HashMap<String, String>>,
    params: Arc<HashMap<String, Parameter>>,
    reporter: Arc<dyn Reporter>,
    http: reqwest::Client,
    rate: RateControl,
    local_limiters: Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl ExecContext {
    #[must_use]
    pub fn new(cancel: CancellationToken, thread_id: usize, env: &RunEnv) -> Self {
        Self::with_rate(cancel, thread_id, env, RateControl::default())
    }

    #[must_use]
    pub fn with_rate(
        cancel: CancellationToken,
        thread_id: usize,
        env: &RunEnv,
        rate: RateControl,
    ) -> Self {
        Self {
            cancel,
            thread_id,
            iteration: AtomicU64::new(0),
            vars: RwLock::new(HashMap::new()),
            params: Arc::clone(&env.params),
            reporter: Arc::clone(&env.reporter),
            http: env.http.clone(),
            rate,
            local_limiters: Mutex::new(HashMap::new()),
        }
    }

    /// Derived context: shallow-copies variables and parameter definitions
    /// and chains cancellation off this context's lifetime.
    #[must_use]
    pub fn child(&self, thread_id: usize) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            thread_id,
            iteration: AtomicU64::new(0),
            vars: RwLock::new(self.read_vars().clone()),
            params: Arc::clone(&self.params),
            reporter: Arc::clone(&self.reporter),
            http: self.http.clone(),
            rate: self.rate.clone(),
            local_limiters: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn thread_id(&self) -> usize {
        self.thread_id
    }

    #[must_use]
    pub fn iteration(&self) -> u64 {
        self.iteration.load(Ordering::Relaxed)
    }

    pub fn set_iteration(&self, iteration: u64) {
        self.iteration.store(iteration, Ordering::Relaxed);
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn report(&self, result: SampleResult) {
        self.reporter.report(result);
    }

    pub fn set_var(&self, key: &str, value: String) {
        match self.vars.write() {
            Ok(mut vars) => {
                vars.insert(key.to_owned(), value);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(key.to_owned(), value);
            }
        }
    }

    #[must_use]
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.read_vars().get(key).cloned()
    }

    #[must_use]
    pub fn parameter_definition(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    /// Replaces `${name}` occurrences with variable values. A missing
    /// variable leaves the literal `${name}` in place; substitution is
    /// purely lexical and does not recurse.
    #[must_use]
    pub fn substitute(&self, text: &str) -> String {
        if !text.contains("${") {
            return text.to_owned();
        }

        let vars = self.read_vars();
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        loop {
            let Some(start) = rest.find("${") else {
                out.push_str(rest);
                break;
            };
            out.push_str(&rest[..start]);

            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                break;
            };

            let key = &after[..end];
            match vars.get(key) {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[start..start + end + 3]),
            }
            rest = &after[end + 1..];
        }

        out
    }

    #[must_use]
    pub fn default_rps(&self) -> f64 {
        self.rate.default_rps
    }

    /// Current intensity multiplier; 1.0 when no profile is active.
    #[must_use]
    pub fn profile_scale(&self) -> f64 {
        self.rate
            .profile_scale
            .as_ref()
            .map_or(1.0, |scale| scale.get())
    }

    /// Gates one sampler invocation per the rate-selection rules:
    /// `base = sampler target, else the published default`, scaled by the
    /// profile; a positive base scaled to zero skips the invocation, and a
    /// positive effective rate acquires from the sampler's limiter,
    /// blocking or not per the thread group's discipline.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Cancelled`] when cancelled during a blocking
    /// acquisition.
    pub async fn rate_gate(
        &self,
        sampler_id: &str,
        sampler_rps: f64,
    ) -> Result<RateGate, ExecError> {
        let base = if sampler_rps == 0.0 {
            self.rate.default_rps
        } else {
            sampler_rps
        };

        let effective = base * self.profile_scale();
        if base > 0.0 && effective <= 0.0 {
            return Ok(RateGate::Skip);
        }

        if effective > 0.0 {
            let limiter = self.limiter_for(sampler_id, effective);
            if (limiter.rate() - effective).abs() > f64::EPSILON {
                limiter.set_rate(effective);
            }

            if self.rate.non_blocking {
                if !limiter.try_acquire() {
                    return Ok(RateGate::Skip);
                }
            } else {
                limiter.acquire(&self.cancel).await?;
            }
        }

        Ok(RateGate::Proceed)
    }

    /// Limiter for a sampler: the thread group's shared store when one is
    /// published, otherwise a limiter cached on this context.
    pub fn limiter_for(&self, sampler_id: &str, rate: f64) -> Arc<RateLimiter> {
        let key = format!("Limiter_{sampler_id}");
        if let Some(shared) = self.rate.shared_limiters.as_ref() {
            return shared.get_or_create(&key, rate);
        }

        let mut local = match self.local_limiters.lock() {
            Ok(local) => local,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            local
                .entry(key)
                .or_insert_with(|| Arc::new(RateLimiter::new(rate))),
        )
    }

    fn read_vars(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, String>> {
        match self.vars.read() {
            Ok(vars) => vars,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
