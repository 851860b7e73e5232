//! Property coercion helpers for element factories. JSON numbers arrive as
//! floating point, so integer reads accept both representations.

use serde_json::{Map, Value};

use super::parameter::Parameter;

#[must_use]
pub fn as_string(props: &Map<String, Value>, key: &str, default: &str) -> String {
    match props.get(key) {
        Some(Value::String(value)) => value.clone(),
        _ => default.to_owned(),
    }
}

#[must_use]
pub fn as_int(props: &Map<String, Value>, key: &str, default: i64) -> i64 {
    match props.get(key) {
        Some(Value::Number(value)) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|float| float as i64))
            .unwrap_or(default),
        _ => default,
    }
}

#[must_use]
pub fn as_float(props: &Map<String, Value>, key: &str, default: f64) -> f64 {
    match props.get(key) {
        Some(Value::Number(value)) => value.as_f64().unwrap_or(default),
        _ => default,
    }
}

/// String list; non-string entries are dropped.
#[must_use]
pub fn as_string_list(props: &Map<String, Value>, key: &str) -> Vec<String> {
    match props.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_owned))
            .collect(),
        _ => Vec::new(),
    }
}

/// Parameter definition list; entries that do not decode are dropped.
#[must_use]
pub fn as_parameter_list(props: &Map<String, Value>, key: &str) -> Vec<Parameter> {
    match props.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| serde_json::from_value::<Parameter>(item.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}
