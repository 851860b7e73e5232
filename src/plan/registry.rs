use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::{Map, Value};

use super::element::TestElement;

/// Constructor for one element type: `(name, props) -> element`.
pub type ElementFactory = fn(&str, &Map<String, Value>) -> Box<dyn TestElement>;

static FACTORIES: OnceLock<HashMap<&'static str, ElementFactory>> = OnceLock::new();

fn factories() -> &'static HashMap<&'static str, ElementFactory> {
    FACTORIES.get_or_init(|| crate::elements::builtin_factories().into_iter().collect())
}

/// Looks up the registered factory for a type tag.
#[must_use]
pub fn lookup_factory(type_tag: &str) -> Option<ElementFactory> {
    factories().get(type_tag).copied()
}
