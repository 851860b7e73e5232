use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::ExecError;
use crate::exec::ExecContext;
use crate::plan::{as_int, ElementBase, Executable, Serializable, TestElement};

/// Executes enabled children `loops` times; `-1` loops until cancellation.
pub struct LoopController {
    base: ElementBase,
    loops: i64,
}

impl LoopController {
    #[must_use]
    pub fn new(name: &str, loops: i64) -> Self {
        Self {
            base: ElementBase::new(name),
            loops,
        }
    }

    pub fn factory(name: &str, props: &Map<String, Value>) -> Box<dyn TestElement> {
        Box::new(Self::new(name, as_int(props, "Loops", 1)))
    }
}

impl TestElement for LoopController {
    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn clone_element(&self) -> Arc<dyn TestElement> {
        Arc::new(Self {
            base: self.base.clone_base(),
            loops: self.loops,
        })
    }

    fn as_executable(&self) -> Option<&dyn Executable> {
        Some(self)
    }

    fn as_serializable(&self) -> Option<&dyn Serializable> {
        Some(self)
    }
}

impl Serializable for LoopController {
    fn type_tag(&self) -> &'static str {
        "LoopController"
    }

    fn props(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("Loops".to_owned(), json!(self.loops));
        props
    }
}

#[async_trait]
impl Executable for LoopController {
    async fn execute(&self, ctx: &ExecContext) -> Result<(), ExecError> {
        let mut iteration = 0i64;
        while self.loops == -1 || iteration < self.loops {
            if ctx.is_cancelled() {
                return Err(ExecError::Cancelled);
            }

            for child in self.children() {
                if !child.enabled() {
                    continue;
                }
                if let Some(executable) = child.as_executable() {
                    executable.execute(ctx).await?;
                }
            }

            iteration = iteration.saturating_add(1);
        }
        Ok(())
    }
}

/// Predicate evaluated by an [`IfController`].
pub type IfCondition = Arc<dyn Fn(&ExecContext) -> bool + Send + Sync>;

/// Executes enabled children when its predicate holds.
///
/// The predicate is runtime-only; the JSON DTO cannot carry it, so hydrated
/// controllers always evaluate to true.
pub struct IfController {
    base: ElementBase,
    condition: IfCondition,
}

impl IfController {
    #[must_use]
    pub fn new(name: &str, condition: IfCondition) -> Self {
        Self {
            base: ElementBase::new(name),
            condition,
        }
    }

    pub fn factory(name: &str, _props: &Map<String, Value>) -> Box<dyn TestElement> {
        Box::new(Self::new(name, Arc::new(|_ctx| true)))
    }
}

impl TestElement for IfController {
    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn clone_element(&self) -> Arc<dyn TestElement> {
        Arc::new(Self {
            base: self.base.clone_base(),
            condition: Arc::clone(&self.condition),
        })
    }

    fn as_executable(&self) -> Option<&dyn Executable> {
        Some(self)
    }

    fn as_serializable(&self) -> Option<&dyn Serializable> {
        Some(self)
    }
}

impl Serializable for IfController {
    fn type_tag(&self) -> &'static str {
        "IfController"
    }

    fn props(&self) -> Map<String, Value> {
        Map::new()
    }
}

#[async_trait]
impl Executable for IfController {
    async fn execute(&self, ctx: &ExecContext) -> Result<(), ExecError> {
        if !(self.condition)(ctx) {
            return Ok(());
        }

        for child in self.children() {
            if !child.enabled() {
                continue;
            }
            if let Some(executable) = child.as_executable() {
                executable.execute(ctx).await?;
            }
        }
        Ok(())
    }
}

/// Sleeps for its configured duration, returning early on cancellation.
pub struct PauseController {
    base: ElementBase,
    duration: Duration,
}

impl PauseController {
    #[must_use]
    pub fn new(name: &str, duration: Duration) -> Self {
        Self {
            base: ElementBase::new(name),
            duration,
        }
    }

    pub fn factory(name: &str, props: &Map<String, Value>) -> Box<dyn TestElement> {
        let millis = as_int(props, "DurationMS", 1000).max(0) as u64;
        Box::new(Self::new(name, Duration::from_millis(millis)))
    }
}

impl TestElement for PauseController {
    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn clone_element(&self) -> Arc<dyn TestElement> {
        Arc::new(Self {
            base: self.base.clone_base(),
            duration: self.duration,
        })
    }

    fn as_executable(&self) -> Option<&dyn Executable> {
        Some(self)
    }

    fn as_serializable(&self) -> Option<&dyn Serializable> {
        Some(self)
    }
}

impl Serializable for PauseController {
    fn type_tag(&self) -> &'static str {
        "PauseController"
    }

    fn props(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("DurationMS".to_owned(), json!(self.duration.as_millis() as u64));
        props
    }
}

#[async_trait]
impl Executable for PauseController {
    async fn execute(&self, ctx: &ExecContext) -> Result<(), ExecError> {
        tokio::select! {
            () = ctx.cancelled() => Err(ExecError::Cancelled),
            () = tokio::time::sleep(self.duration) => Ok(()),
        }
    }
}
