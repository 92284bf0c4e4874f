//! Walks a call's parameter map looking for HTML/script content, runaway
//! string lengths, and injection/traversal heuristics (spec §4.9).

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

const MAX_STRING_LEN: usize = 10_000;

#[derive(Debug, Clone, Default)]
pub struct SanitizeReport {
    pub clean: HashMap<String, Value>,
    pub warnings: Vec<String>,
    pub blocked: Vec<String>,
}

impl SanitizeReport {
    pub fn is_blocked(&self) -> bool {
        !self.blocked.is_empty()
    }
}

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<\s*/?\s*[a-z][a-z0-9]*[^>]*>").unwrap())
}

fn sql_injection_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)('\s*or\s*'1'\s*=\s*'1)|(--\s)|(/\*)|(;\s*drop\s+table)").unwrap())
}

fn shell_destructive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[;&|`$]\s*(rm\s+-rf|mkfs|dd\s+if=|:\(\)\s*\{)").unwrap())
}

fn strip_html(s: &str) -> (String, bool) {
    if html_tag_re().is_match(s) {
        (html_tag_re().replace_all(s, "").to_string(), true)
    } else {
        (s.to_string(), false)
    }
}

fn has_path_traversal(s: &str) -> bool {
    s.contains("../") || s.contains("..\\") || s.starts_with("/etc/") || s.starts_with("/proc/")
}

/// Sanitizes a single string value, returning the cleaned value and any
/// warning/block reasons attached to `field`.
fn sanitize_string(field: &str, s: &str, warnings: &mut Vec<String>, blocked: &mut Vec<String>) -> Value {
    let (mut cleaned, stripped) = strip_html(s);
    if stripped {
        warnings.push(format!("field `{field}` contained HTML/script tags, stripped"));
    }

    if cleaned.len() > MAX_STRING_LEN {
        cleaned.truncate(MAX_STRING_LEN);
        warnings.push(format!("field `{field}` truncated to {MAX_STRING_LEN} characters"));
    }

    if sql_injection_re().is_match(&cleaned) {
        blocked.push(format!("field `{field}` matches a SQL injection heuristic"));
    }
    if has_path_traversal(&cleaned) {
        blocked.push(format!("field `{field}` contains a path traversal sequence"));
    }
    if shell_destructive_re().is_match(&cleaned) {
        blocked.push(format!("field `{field}` combines shell metacharacters with a destructive command"));
    }

    Value::String(cleaned)
}

fn sanitize_value(field: &str, value: &Value, warnings: &mut Vec<String>, blocked: &mut Vec<String>) -> Value {
    match value {
        Value::String(s) => sanitize_string(field, s, warnings, blocked),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| sanitize_value(&format!("{field}[{i}]"), item, warnings, blocked))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize_value(&format!("{field}.{k}"), v, warnings, blocked)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Walks every field in `params`. Cleaned values are always returned
/// (truncated/stripped in place); `blocked` entries mean the executor
/// should refuse the call outright, while `warnings` are logged/audited
/// but do not stop dispatch.
pub fn sanitize(params: &HashMap<String, Value>) -> SanitizeReport {
    let mut report = SanitizeReport::default();
    for (field, value) in params {
        let cleaned = sanitize_value(field, value, &mut report.warnings, &mut report.blocked);
        report.clean.insert(field.clone(), cleaned);
    }
    report
}
