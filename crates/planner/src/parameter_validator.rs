//! Type/enum/numeric/regex validation and best-effort coercion of tool
//! call parameters against a tool's schema (spec §4.7).

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use yukie_domain::model::{ParamType, Parameter, ToolSchema};

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

fn type_matches(value: &Value, expected: ParamType) -> bool {
    match expected {
        ParamType::String => value.is_string(),
        ParamType::Number => value.is_number(),
        ParamType::Boolean => value.is_boolean(),
        // Arrays are not objects, and vice versa — spec §4.7 explicit note.
        ParamType::Object => value.is_object(),
        ParamType::Array => value.is_array(),
    }
}

fn enum_ok(value: &Value, enum_values: &[String]) -> bool {
    match value.as_str() {
        Some(s) => enum_values.iter().any(|v| v == s),
        None => true, // enum is only checked against string form
    }
}

fn numeric_bounds_ok(value: &Value, min: Option<f64>, max: Option<f64>) -> bool {
    let Some(n) = value.as_f64() else { return true };
    if let Some(min) = min {
        if n < min {
            return false;
        }
    }
    if let Some(max) = max {
        if n > max {
            return false;
        }
    }
    true
}

fn pattern_ok(value: &Value, pattern: &str) -> bool {
    let Some(s) = value.as_str() else { return true };
    match Regex::new(pattern) {
        Ok(re) => re.is_match(s),
        Err(_) => true, // a malformed schema pattern never fails user input
    }
}

/// Validates `params` against `schema`'s parameter list. Unknown params
/// are warned but never fail validation.
pub fn validate(params: &HashMap<String, Value>, schema: &ToolSchema) -> ValidationOutcome {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for param in &schema.parameters {
        match params.get(&param.name) {
            None => {
                if param.required {
                    errors.push(format!("missing required parameter `{}`", param.name));
                }
            }
            Some(value) => {
                if !type_matches(value, param.param_type) {
                    errors.push(format!(
                        "parameter `{}` expected type {:?}, got {}",
                        param.name, param.param_type, value
                    ));
                    continue;
                }
                if let Some(enum_values) = &param.enum_values {
                    if !enum_ok(value, enum_values) {
                        errors.push(format!(
                            "parameter `{}` value {} is not one of {:?}",
                            param.name, value, enum_values
                        ));
                    }
                }
                if !numeric_bounds_ok(value, param.min, param.max) {
                    errors.push(format!(
                        "parameter `{}` value {} is outside the allowed range",
                        param.name, value
                    ));
                }
                if let Some(pattern) = &param.pattern {
                    if !pattern_ok(value, pattern) {
                        errors.push(format!(
                            "parameter `{}` value {} does not match pattern {pattern}",
                            param.name, value
                        ));
                    }
                }
            }
        }
    }

    let known: std::collections::HashSet<&str> =
        schema.parameters.iter().map(|p| p.name.as_str()).collect();
    for key in params.keys() {
        if !known.contains(key.as_str()) {
            warnings.push(format!("unknown parameter `{key}` is not part of the tool schema"));
        }
    }

    ValidationOutcome {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn coerce_value(value: Value, param_type: ParamType) -> Value {
    match (param_type, &value) {
        (ParamType::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(value),
        (ParamType::Boolean, Value::String(s)) => match s.to_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => value,
        },
        (ParamType::Boolean, Value::Number(n)) => Value::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        (ParamType::String, Value::String(_)) => value,
        (ParamType::String, other) => Value::String(other.to_string()),
        (ParamType::Array, Value::String(s)) => serde_json::from_str::<Value>(s)
            .ok()
            .filter(|v| v.is_array())
            .unwrap_or_else(|| {
                Value::Array(
                    s.split(',')
                        .map(|part| Value::String(part.trim().to_string()))
                        .collect(),
                )
            }),
        (ParamType::Object, Value::String(s)) => {
            serde_json::from_str::<Value>(s).unwrap_or(value)
        }
        _ => value,
    }
}

/// Best-effort type coercion followed by default-filling for still-missing
/// optional parameters. Runs before [`validate`] (spec §4.7).
pub fn coerce_params(
    mut params: HashMap<String, Value>,
    schema: &ToolSchema,
) -> HashMap<String, Value> {
    for param in &schema.parameters {
        if let Some(value) = params.remove(&param.name) {
            params.insert(param.name.clone(), coerce_value(value, param.param_type));
        } else if let Some(default) = &param.default {
            params.insert(param.name.clone(), default.clone());
        }
    }
    params
}

pub fn find_parameter<'a>(schema: &'a ToolSchema, name: &str) -> Option<&'a Parameter> {
    schema.parameters.iter().find(|p| p.name == name)
}
