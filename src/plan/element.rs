use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::ExecError;
use crate::exec::{ExecContext, RunEnv};

use super::parameter::Parameter;

/// Node in a test plan tree.
///
/// Elements share a common [`ElementBase`] (identity, name, enable flag,
/// ordered children) and advertise optional capabilities through the
/// `as_*` accessors instead of a class hierarchy.
pub trait TestElement: Send + Sync {
    fn base(&self) -> &ElementBase;
    fn base_mut(&mut self) -> &mut ElementBase;

    fn id(&self) -> &str {
        &self.base().id
    }

    fn set_id(&mut self, id: String) {
        self.base_mut().id = id;
    }

    fn name(&self) -> &str {
        &self.base().name
    }

    fn set_name(&mut self, name: String) {
        self.base_mut().name = name;
    }

    fn enabled(&self) -> bool {
        self.base().enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.base_mut().enabled = enabled;
    }

    /// Children in execution order.
    fn children(&self) -> &[Arc<dyn TestElement>] {
        &self.base().children
    }

    fn add_child(&mut self, child: Arc<dyn TestElement>) {
        self.base_mut().children.push(child);
    }

    /// Removes the child with the given id, keeping the order of the rest.
    fn remove_child(&mut self, child_id: &str) {
        self.base_mut()
            .children
            .retain(|child| child.id() != child_id);
    }

    /// Deep copy with fresh ids throughout the subtree.
    fn clone_element(&self) -> Arc<dyn TestElement>;

    /// Parameter definitions attached to this element (plan roots only).
    fn parameters(&self) -> &[Parameter] {
        &[]
    }

    fn as_executable(&self) -> Option<&dyn Executable> {
        None
    }

    fn as_thread_group(&self) -> Option<&dyn ThreadGroup> {
        None
    }

    fn as_serializable(&self) -> Option<&dyn Serializable> {
        None
    }
}

/// Elements that perform an action when invoked with a context.
#[async_trait]
pub trait Executable: Send + Sync {
    async fn execute(&self, ctx: &ExecContext) -> Result<(), ExecError>;
}

/// Top-level scheduler elements started by the plan runner.
#[async_trait]
pub trait ThreadGroup: Send + Sync {
    /// Drives workers over the subtree until completion or cancellation.
    async fn start(&self, cancel: CancellationToken, env: RunEnv);
}

/// Elements that round-trip through the DTO codec.
pub trait Serializable {
    fn type_tag(&self) -> &'static str;
    fn props(&self) -> Map<String, Value>;
}

/// Shared state of every plan element.
pub struct ElementBase {
    id: String,
    name: String,
    enabled: bool,
    children: Vec<Arc<dyn TestElement>>,
}

impl ElementBase {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            id: generate_id(),
            name: name.to_owned(),
            enabled: true,
            children: Vec::new(),
        }
    }

    /// Fresh base carrying the same name and enable flag plus deep-cloned
    /// children, under a new id.
    #[must_use]
    pub fn clone_base(&self) -> Self {
        Self {
            id: generate_id(),
            name: self.name.clone(),
            enabled: self.enabled,
            children: self
                .children
                .iter()
                .map(|child| child.clone_element())
                .collect(),
        }
    }
}

/// Plain plan root (`"TestPlan"`). Carries the per-plan parameter
/// definitions that seed worker contexts.
pub struct PlanRoot {
    base: ElementBase,
    parameters: Vec<Parameter>,
}

impl PlanRoot {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            base: ElementBase::new(name),
            parameters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_parameters(name: &str, parameters: Vec<Parameter>) -> Self {
        Self {
            base: ElementBase::new(name),
            parameters,
        }
    }

    pub fn set_parameters(&mut self, parameters: Vec<Parameter>) {
        self.parameters = parameters;
    }

    pub fn factory(name: &str, props: &Map<String, Value>) -> Box<dyn TestElement> {
        Box::new(Self::with_parameters(
            name,
            super::props::as_parameter_list(props, "Parameters"),
        ))
    }
}

impl TestElement for PlanRoot {
    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn clone_element(&self) -> Arc<dyn TestElement> {
        Arc::new(Self {
            base: self.base.clone_base(),
            parameters: self.parameters.clone(),
        })
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn as_serializable(&self) -> Option<&dyn Serializable> {
        Some(self)
    }
}

impl Serializable for PlanRoot {
    fn type_tag(&self) -> &'static str {
        super::TEST_PLAN_TAG
    }

    fn props(&self) -> Map<String, Value> {
        let mut props = Map::new();
        if !self.parameters.is_empty() {
            let rendered = self
                .parameters
                .iter()
                .map(|param| serde_json::to_value(param).unwrap_or(Value::Null))
                .collect();
            props.insert("Parameters".to_owned(), Value::Array(rendered));
        }
        props
    }
}

/// Snapshot of the enabled children, in order, for worker tasks.
#[must_use]
pub fn enabled_children(element: &dyn TestElement) -> Vec<Arc<dyn TestElement>> {
    element
        .children()
        .iter()
        .filter(|child| child.enabled())
        .cloned()
        .collect()
}

fn generate_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    format!("id_{nanos}_{seq}")
}
