use serde_json::Value;
use tracing::{debug, warn};

use crate::exec::ExecContext;
use crate::plan::ParameterKind;

/// Runs the configured extractors over a response body, writing extracted
/// values into the context. Extraction failures fall back to the
/// parameter's default value when one is set; the run continues either way.
pub(super) fn apply_extractors(
    ctx: &ExecContext,
    sampler_name: &str,
    extract_vars: &[String],
    body: &str,
) {
    for var_name in extract_vars {
        let Some(param) = ctx.parameter_definition(var_name) else {
            warn!(
                "Parameter definition for {:?} not found (sampler {:?})",
                var_name, sampler_name
            );
            continue;
        };

        match param.kind {
            ParameterKind::Regexp => {
                if param.expression.is_empty() {
                    debug!("Param {:?} has an empty expression, using fallback", var_name);
                    apply_fallback(ctx, var_name, &param.value);
                    continue;
                }

                let regex = match regex::Regex::new(&param.expression) {
                    Ok(regex) => regex,
                    Err(err) => {
                        warn!("Invalid regex for {:?}: {}", var_name, err);
                        continue;
                    }
                };

                match regex.captures(body) {
                    Some(captures) => {
                        let matched = captures
                            .get(1)
                            .or_else(|| captures.get(0))
                            .map(|group| group.as_str().to_owned())
                            .unwrap_or_default();
                        debug!("Extracted {}={:?}", var_name, matched);
                        ctx.set_var(var_name, matched);
                    }
                    None => {
                        debug!(
                            "No match for {:?}, using fallback {:?}",
                            var_name, param.value
                        );
                        apply_fallback(ctx, var_name, &param.value);
                    }
                }
            }
            ParameterKind::Json => {
                if param.expression.is_empty() {
                    debug!("Param {:?} has an empty JSON path, using fallback", var_name);
                    apply_fallback(ctx, var_name, &param.value);
                    continue;
                }

                match extract_json_path(body, &param.expression) {
                    Some(value) if !value.is_empty() => {
                        debug!(
                            "Extracted {}={:?} from JSON path {:?}",
                            var_name, value, param.expression
                        );
                        ctx.set_var(var_name, value);
                    }
                    _ => {
                        debug!(
                            "No value at JSON path {:?}, using fallback {:?}",
                            param.expression, param.value
                        );
                        apply_fallback(ctx, var_name, &param.value);
                    }
                }
            }
            ParameterKind::Static => {}
        }
    }
}

fn apply_fallback(ctx: &ExecContext, var_name: &str, fallback: &str) {
    if !fallback.is_empty() {
        ctx.set_var(var_name, fallback.to_owned());
    }
}

/// Evaluates a dot-notation path over a JSON document and stringifies the
/// leaf. Numeric segments index arrays. Examples: `user.name`,
/// `data.items.0.id`.
#[must_use]
pub fn extract_json_path(json_str: &str, path: &str) -> Option<String> {
    if json_str.is_empty() || path.is_empty() {
        return None;
    }

    let document: Value = match serde_json::from_str(json_str) {
        Ok(document) => document,
        Err(err) => {
            warn!("Failed to parse JSON body: {}", err);
            return None;
        }
    };

    let mut current = &document;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
        if current.is_null() {
            return None;
        }
    }

    Some(stringify_leaf(current))
}

fn stringify_leaf(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number
            .as_i64()
            .map(|int| int.to_string())
            .or_else(|| number.as_u64().map(|uint| uint.to_string()))
            .unwrap_or_else(|| {
                let float = number.as_f64().unwrap_or(0.0);
                format!("{float}")
            }),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
