use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::PlanError;

use super::element::{PlanRoot, TestElement};
use super::props::as_parameter_list;
use super::registry::lookup_factory;
use super::TEST_PLAN_TAG;

/// Wire shape of one plan element.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestElementDto {
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Omitted means enabled, for backward compatibility with old plans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub props: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TestElementDto>,
}

impl TestElementDto {
    /// Serializes a plan tree into its DTO.
    #[must_use]
    pub fn from_element(element: &dyn TestElement) -> Self {
        let (type_tag, props) = match element.as_serializable() {
            Some(serializable) => (serializable.type_tag().to_owned(), serializable.props()),
            None => (TEST_PLAN_TAG.to_owned(), Map::new()),
        };

        Self {
            type_tag,
            id: element.id().to_owned(),
            name: element.name().to_owned(),
            enabled: if element.enabled() { None } else { Some(false) },
            props,
            children: element
                .children()
                .iter()
                .map(|child| Self::from_element(child.as_ref()))
                .collect(),
        }
    }

    /// Hydrates a plan tree from its DTO.
    ///
    /// Children of unknown type are skipped; an unknown type at this level
    /// is an error unless the tag is `TestPlan`, which constructs a plain
    /// root.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::UnknownElementType`] when no factory is
    /// registered for `type`.
    pub fn into_element(&self) -> Result<Arc<dyn TestElement>, PlanError> {
        let mut element = match lookup_factory(&self.type_tag) {
            Some(factory) => factory(&self.name, &self.props),
            None if self.type_tag == TEST_PLAN_TAG => {
                let mut root = PlanRoot::new(&self.name);
                root.set_parameters(as_parameter_list(&self.props, "Parameters"));
                Box::new(root)
            }
            None => {
                return Err(PlanError::UnknownElementType {
                    type_tag: self.type_tag.clone(),
                });
            }
        };

        if !self.id.is_empty() {
            element.set_id(self.id.clone());
        }
        if let Some(enabled) = self.enabled {
            element.set_enabled(enabled);
        }

        for child_dto in &self.children {
            match child_dto.into_element() {
                Ok(child) => element.add_child(child),
                Err(err) => {
                    debug!("Skipping plan child: {}", err);
                }
            }
        }

        Ok(Arc::from(element))
    }
}

/// Decodes a plan DTO from JSON and hydrates it.
///
/// # Errors
///
/// Returns an error when the payload is not valid JSON or the root type is
/// unknown.
pub fn parse_test_plan(data: &[u8]) -> Result<Arc<dyn TestElement>, PlanError> {
    let dto: TestElementDto =
        serde_json::from_slice(data).map_err(|err| PlanError::DecodePlan { source: err })?;
    dto.into_element()
}

/// Serializes a plan tree to compact JSON.
///
/// # Errors
///
/// Returns an error when encoding fails.
pub fn render_test_plan(root: &dyn TestElement) -> Result<String, PlanError> {
    serde_json::to_string(&TestElementDto::from_element(root))
        .map_err(|err| PlanError::EncodePlan { source: err })
}

/// Serializes a plan tree to pretty-printed JSON, the on-disk form.
///
/// # Errors
///
/// Returns an error when encoding fails.
pub fn render_test_plan_pretty(root: &dyn TestElement) -> Result<String, PlanError> {
    serde_json::to_string_pretty(&TestElementDto::from_element(root))
        .map_err(|err| PlanError::EncodePlan { source: err })
}
