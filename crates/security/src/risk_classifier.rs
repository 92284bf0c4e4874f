//! Per-call risk assessment (spec §4.9).

use serde_json::Value;
use yukie_domain::model::{RiskAssessment, RiskLevel, ServiceDefinition, ToolCall};

fn escalate(level: RiskLevel, to: RiskLevel) -> RiskLevel {
    level.max(to)
}

fn is_destructive_tool_name(tool_name: &str) -> bool {
    let lower = tool_name.to_lowercase();
    ["delete", "remove", "drop", "purge"]
        .iter()
        .any(|marker| lower.contains(marker))
}

fn is_bulk_call(call: &ToolCall) -> bool {
    call.params.values().any(|v| match v {
        Value::Array(items) => items.len() > 10,
        _ => false,
    }) || call
        .params
        .get("bulk")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn is_financial_service(service: &ServiceDefinition) -> bool {
    let markers = ["payment", "financial", "finance", "billing"];
    markers.iter().any(|m| {
        service.name.to_lowercase().contains(m)
            || service.description.to_lowercase().contains(m)
            || service.tags.iter().any(|t| t.to_lowercase().contains(m))
            || service.capabilities.iter().any(|c| c.to_lowercase().contains(m))
    })
}

fn has_admin_or_root_flag(call: &ToolCall) -> bool {
    call.params.iter().any(|(key, value)| {
        let key_lower = key.to_lowercase();
        if key_lower == "admin" || key_lower == "root" {
            return value.as_bool().unwrap_or(true);
        }
        matches!(value, Value::String(s) if s.eq_ignore_ascii_case("admin") || s.eq_ignore_ascii_case("root"))
    })
}

/// Classifies `call`'s risk, escalating the tool's declared base level
/// per spec §4.9's rule table.
pub fn classify(call: &ToolCall, service: &ServiceDefinition) -> RiskAssessment {
    let mut level = call.risk_level;
    let mut reasons = Vec::new();

    if is_destructive_tool_name(&call.tool_name) {
        level = escalate(level, RiskLevel::High);
        reasons.push(format!("tool name `{}` matches a destructive action pattern", call.tool_name));
    }
    if is_bulk_call(call) {
        level = escalate(level, RiskLevel::Medium);
        reasons.push("call parameters indicate a bulk operation".to_string());
    }
    if is_financial_service(service) {
        level = escalate(level, RiskLevel::High);
        reasons.push(format!("service `{}` is a payment/financial service", service.id));
    }
    if has_admin_or_root_flag(call) {
        level = escalate(level, RiskLevel::High);
        reasons.push("call parameters carry an admin/root flag".to_string());
    }

    let mitigation = match level {
        RiskLevel::High => Some("require explicit user confirmation before dispatch".to_string()),
        RiskLevel::Medium => Some("surface a confirmation prompt summarising the action".to_string()),
        RiskLevel::Low => None,
    };

    RiskAssessment {
        level,
        requires_confirmation: matches!(level, RiskLevel::Medium | RiskLevel::High),
        reasons,
        mitigation,
    }
}
