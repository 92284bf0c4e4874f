//! Resolves `${callId.path.to.field}` parameter references against
//! completed call results before dispatch (spec §4.8).

use serde_json::Value;
use std::collections::HashMap;
use yukie_domain::callref;
use yukie_domain::model::ToolCallResult;

/// Replaces every string-valued `${...}` reference in `params` with the
/// value it resolves to against `results`. A reference whose call hasn't
/// completed, or whose path doesn't resolve, becomes `Value::Null`
/// ("undefined" per spec wording) rather than failing the call outright.
pub fn resolve_params(
    params: &HashMap<String, Value>,
    results: &HashMap<String, ToolCallResult>,
) -> HashMap<String, Value> {
    params
        .iter()
        .map(|(key, value)| (key.clone(), resolve_value(value, results)))
        .collect()
}

fn resolve_value(value: &Value, results: &HashMap<String, ToolCallResult>) -> Value {
    match value {
        Value::String(s) => match callref::parse(s) {
            Some(reference) => results
                .get(&reference.call_id)
                .and_then(|r| r.result.as_ref())
                .and_then(|result| callref::resolve(&reference.path, result))
                .cloned()
                .unwrap_or(Value::Null),
            None => value.clone(),
        },
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn completed(id: &str, result: Value) -> ToolCallResult {
        ToolCallResult {
            id: id.to_string(),
            service_id: "svc".into(),
            tool_name: "tool".into(),
            success: true,
            result: Some(result),
            error: None,
            duration_ms: 1,
        }
    }

    #[test]
    fn resolves_nested_field_from_completed_call() {
        let mut results = HashMap::new();
        results.insert("c1".to_string(), completed("c1", json!({"id": "abc"})));
        let mut params = HashMap::new();
        params.insert("ref_id".to_string(), json!("${c1.id}"));
        let resolved = resolve_params(&params, &results);
        assert_eq!(resolved.get("ref_id").unwrap(), &json!("abc"));
    }

    #[test]
    fn unresolved_call_becomes_null() {
        let results = HashMap::new();
        let mut params = HashMap::new();
        params.insert("ref_id".to_string(), json!("${c1.id}"));
        let resolved = resolve_params(&params, &results);
        assert_eq!(resolved.get("ref_id").unwrap(), &Value::Null);
    }

    #[test]
    fn non_reference_strings_pass_through() {
        let results = HashMap::new();
        let mut params = HashMap::new();
        params.insert("category".to_string(), json!("prod"));
        let resolved = resolve_params(&params, &results);
        assert_eq!(resolved.get("category").unwrap(), &json!("prod"));
    }

    #[test]
    fn dangling_path_on_completed_call_becomes_null() {
        let mut results = HashMap::new();
        results.insert("c1".to_string(), completed("c1", json!({"id": "abc"})));
        let mut params = HashMap::new();
        params.insert("ref_id".to_string(), json!("${c1.missing.field}"));
        let resolved = resolve_params(&params, &results);
        assert_eq!(resolved.get("ref_id").unwrap(), &Value::Null);
    }
}
