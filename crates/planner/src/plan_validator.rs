//! Plan validation: unknown_tool, missing_scope, missing_param,
//! invalid_param, circular_dependency (spec §4.6).

use crate::parameter_validator;
use crate::AvailableTool;
use yukie_domain::callref;
use yukie_domain::model::{AuthContext, Plan, RiskLevel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    UnknownTool,
    MissingScope,
    MissingParam,
    InvalidParam,
    CircularDependency,
}

#[derive(Debug, Clone)]
pub struct PlanValidationError {
    pub kind: ValidationErrorKind,
    pub call_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct PlanValidationWarning {
    pub call_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct PlanValidation {
    pub errors: Vec<PlanValidationError>,
    pub warnings: Vec<PlanValidationWarning>,
}

impl PlanValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

fn find_tool<'a>(tools: &'a [AvailableTool], service_id: &str, tool_name: &str) -> Option<&'a AvailableTool> {
    tools
        .iter()
        .find(|t| t.service_id == service_id && t.tool.name == tool_name)
}

/// Validates `plan` against the set of tools available to this request and
/// the caller's auth scopes. Non-fatal warnings (high-risk, async/slow
/// tools) never block execution; errors do.
pub fn validate_plan(plan: &Plan, auth: &AuthContext, available_tools: &[AvailableTool]) -> PlanValidation {
    let mut result = PlanValidation::default();

    for dag_error in plan.check_invariants() {
        result.errors.push(PlanValidationError {
            kind: ValidationErrorKind::CircularDependency,
            call_id: None,
            message: dag_error,
        });
    }

    for call in &plan.tool_calls {
        let Some(available) = find_tool(available_tools, &call.service_id, &call.tool_name) else {
            result.errors.push(PlanValidationError {
                kind: ValidationErrorKind::UnknownTool,
                call_id: Some(call.id.clone()),
                message: format!("unknown tool {}.{}", call.service_id, call.tool_name),
            });
            continue;
        };

        if !auth.has_all_scopes(available.tool.required_scopes.iter()) {
            result.errors.push(PlanValidationError {
                kind: ValidationErrorKind::MissingScope,
                call_id: Some(call.id.clone()),
                message: format!(
                    "call {} requires scopes {:?} which auth context lacks",
                    call.id, available.tool.required_scopes
                ),
            });
        }

        // Required params must be present or derivable from a dependsOn
        // reference (spec §4.7's coercion runs later; here we only check
        // presence/derivability).
        for param in &available.tool.parameters {
            if !param.required {
                continue;
            }
            match call.params.get(&param.name) {
                None => result.errors.push(PlanValidationError {
                    kind: ValidationErrorKind::MissingParam,
                    call_id: Some(call.id.clone()),
                    message: format!("call {} missing required parameter `{}`", call.id, param.name),
                }),
                Some(serde_json::Value::String(s)) => {
                    if let Some(reference) = callref::parse(s) {
                        if !call.depends_on.contains(&reference.call_id) {
                            result.errors.push(PlanValidationError {
                                kind: ValidationErrorKind::MissingParam,
                                call_id: Some(call.id.clone()),
                                message: format!(
                                    "call {} parameter `{}` references {} which is not in dependsOn",
                                    call.id, param.name, reference.call_id
                                ),
                            });
                        }
                    }
                }
                Some(_) => {}
            }
        }

        // Type/enum/range/pattern checks, skipping params that are still
        // unresolved `${...}` references.
        let concrete_params: std::collections::HashMap<String, serde_json::Value> = call
            .params
            .iter()
            .filter(|(_, v)| !matches!(v, serde_json::Value::String(s) if callref::parse(s).is_some()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let outcome = parameter_validator::validate(&concrete_params, &available.tool);
        for error in outcome.errors {
            result.errors.push(PlanValidationError {
                kind: ValidationErrorKind::InvalidParam,
                call_id: Some(call.id.clone()),
                message: error,
            });
        }
        for warning in outcome.warnings {
            result.warnings.push(PlanValidationWarning {
                call_id: call.id.clone(),
                message: warning,
            });
        }

        if call.risk_level == RiskLevel::High {
            result.warnings.push(PlanValidationWarning {
                call_id: call.id.clone(),
                message: "high-risk tool call".to_string(),
            });
        }
        if available.tool.returns_async {
            result.warnings.push(PlanValidationWarning {
                call_id: call.id.clone(),
                message: "tool is asynchronous and may be slow".to_string(),
            });
        }
    }

    result
}
