//! LLM-driven multi-tool plan synthesis (spec §4.6).

use crate::parameter_validator;
use chrono::Utc;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;
use yukie_domain::model::{AuthContext, ExecutionMode, Plan, RiskLevel, ToolCall};
use yukie_providers::{extract_json, ChatRequest, LlmProvider};

/// A tool this request is allowed to plan against, paired with the
/// service it belongs to.
#[derive(Debug, Clone)]
pub struct AvailableTool {
    pub service_id: String,
    pub tool: yukie_domain::model::ToolSchema,
    pub risk_level: RiskLevel,
}

pub struct PlanRequest<'a> {
    pub message: &'a str,
    pub auth: &'a AuthContext,
    pub available_tools: &'a [AvailableTool],
    pub model: Option<String>,
    pub max_tools: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct LlmPlanCall {
    #[serde(rename = "serviceId")]
    service_id: String,
    #[serde(rename = "toolName")]
    tool_name: String,
    #[serde(default)]
    params: HashMap<String, serde_json::Value>,
    #[serde(default, rename = "dependsOn")]
    depends_on: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LlmPlanResponse {
    calls: Vec<LlmPlanCall>,
    #[serde(rename = "executionMode", default)]
    execution_mode: Option<String>,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

fn default_confidence() -> f64 {
    0.5
}

#[derive(Debug, Deserialize)]
struct LlmParamExtraction {
    #[serde(default)]
    params: HashMap<String, serde_json::Value>,
}

fn parse_execution_mode(raw: Option<&str>, call_count: usize) -> ExecutionMode {
    match raw.map(|s| s.to_lowercase()) {
        Some(s) if s == "single" => ExecutionMode::Single,
        Some(s) if s == "parallel" => ExecutionMode::Parallel,
        Some(s) if s == "sequential" => ExecutionMode::Sequential,
        Some(s) if s == "mixed" => ExecutionMode::Mixed,
        _ if call_count <= 1 => ExecutionMode::Single,
        _ => ExecutionMode::Mixed,
    }
}

/// Layers call ids into a topological `executionOrder`: each group holds
/// ids whose `dependsOn` all lie in strictly earlier groups. Ids involved
/// in a cycle (not reachable by this layering) are appended as trailing
/// singleton groups so every id still appears exactly once — validation
/// downstream is what actually rejects the cycle.
fn compute_execution_order(calls: &[ToolCall]) -> Vec<Vec<String>> {
    let mut remaining: HashSet<String> = calls.iter().map(|c| c.id.clone()).collect();
    let by_id: HashMap<&str, &ToolCall> = calls.iter().map(|c| (c.id.as_str(), c)).collect();
    let mut order = Vec::new();

    while !remaining.is_empty() {
        let ready: Vec<String> = remaining
            .iter()
            .filter(|id| {
                by_id[id.as_str()]
                    .depends_on
                    .iter()
                    .all(|dep| !remaining.contains(dep))
            })
            .cloned()
            .collect();

        if ready.is_empty() {
            // Cycle: drain the rest as singleton groups so every id is
            // still present (validate_plan will flag this as an error).
            let mut rest: Vec<String> = remaining.drain().collect();
            rest.sort();
            for id in rest {
                order.push(vec![id]);
            }
            break;
        }

        let mut group = ready;
        group.sort();
        for id in &group {
            remaining.remove(id);
        }
        order.push(group);
    }

    order
}

fn available_list_prompt(tools: &[AvailableTool]) -> String {
    tools
        .iter()
        .map(|t| {
            let params: Vec<String> = t
                .tool
                .parameters
                .iter()
                .map(|p| format!("{}{}:{:?}", p.name, if p.required { "*" } else { "" }, p.param_type))
                .collect();
            format!(
                "- serviceId={} toolName={} params=[{}]: {}",
                t.service_id,
                t.tool.name,
                params.join(", "),
                t.tool.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Produces a [`Plan`] from a message and the tools available to this
/// request. A single available tool takes the deterministic single-call
/// path; more than one prompts the LLM for a full multi-tool plan.
pub async fn plan(llm: &Arc<dyn LlmProvider>, req: PlanRequest<'_>) -> Plan {
    if req.available_tools.len() <= 1 {
        return plan_single(llm, &req).await;
    }
    plan_multi(llm, &req).await
}

async fn plan_single(llm: &Arc<dyn LlmProvider>, req: &PlanRequest<'_>) -> Plan {
    let now = Utc::now();
    let Some(available) = req.available_tools.first() else {
        return empty_plan(req.message, "no tool available to plan against");
    };

    let prompt = format!(
        "Extract the parameters for this tool call from the user message.\n\n\
         Tool: {} ({})\nParameters: {}\n\nUser message: {}\n\n\
         Respond with strict JSON only: {{\"params\": {{...}}}}.",
        available.tool.name,
        available.tool.description,
        available_list_prompt(std::slice::from_ref(available)),
        req.message
    );
    let mut chat_req = ChatRequest::new(
        "You extract structured tool parameters and reply with strict JSON only.",
        prompt,
    );
    chat_req.json_mode = true;
    chat_req.model = req.model.clone();
    chat_req.temperature = Some(0.0);

    // Deterministic fallback (spec §9 open question): when the LLM call
    // fails or its reply cannot be parsed as strict JSON, the planner
    // never guesses field values — it emits an empty params map and lets
    // `validate_plan`'s missing_param check surface the gap to the caller.
    let params = match llm.chat(chat_req).await {
        Ok(resp) => extract_json::<LlmParamExtraction>(&resp.content)
            .map(|p| p.params)
            .unwrap_or_default(),
        Err(err) => {
            tracing::warn!(error = %err, "planner parameter extraction LLM call failed, falling back to empty params");
            HashMap::new()
        }
    };
    let params = parameter_validator::coerce_params(params, &available.tool);

    let call = ToolCall {
        id: "c1".to_string(),
        service_id: available.service_id.clone(),
        tool_name: available.tool.name.clone(),
        params,
        depends_on: vec![],
        risk_level: available.tool.risk_level.unwrap_or(available.risk_level),
    };

    Plan {
        id: Uuid::new_v4().to_string(),
        message: req.message.to_string(),
        tool_calls: vec![call],
        execution_mode: ExecutionMode::Single,
        execution_order: vec![vec!["c1".to_string()]],
        confidence: 1.0,
        reasoning: format!("single candidate tool {}.{}", available.service_id, available.tool.name),
        created_at: now,
    }
}

async fn plan_multi(llm: &Arc<dyn LlmProvider>, req: &PlanRequest<'_>) -> Plan {
    let now = Utc::now();
    let max_tools = req.max_tools.unwrap_or(5);
    let prompt = format!(
        "Plan the tool calls needed to satisfy the user message, using only the \
         tools listed below. Use at most {max_tools} calls. If one call's input \
         depends on another's output, set dependsOn and reference the prior \
         call's result with \"${{callId.path.to.field}}\".\n\n\
         Available tools:\n{}\n\nUser message: {}\n\n\
         Respond with strict JSON only: {{\"calls\": [{{\"serviceId\": ..., \
         \"toolName\": ..., \"params\": {{...}}, \"dependsOn\": [...]}}], \
         \"executionMode\": \"single\"|\"parallel\"|\"sequential\"|\"mixed\", \
         \"confidence\": <0..1>, \"reasoning\": <short text>}}.",
        available_list_prompt(req.available_tools),
        req.message
    );

    let mut chat_req = ChatRequest::new(
        "You are a precise tool-call planner that replies with strict JSON only.",
        prompt,
    );
    chat_req.json_mode = true;
    chat_req.model = req.model.clone();
    chat_req.temperature = Some(0.0);

    let parsed = match llm.chat(chat_req).await {
        Ok(resp) => extract_json::<LlmPlanResponse>(&resp.content),
        Err(err) => {
            tracing::warn!(error = %err, "planner LLM call failed");
            None
        }
    };

    let Some(parsed) = parsed else {
        return empty_plan(req.message, "planning failed");
    };
    if parsed.calls.is_empty() {
        return empty_plan(req.message, &parsed.reasoning);
    }

    let tool_calls: Vec<ToolCall> = parsed
        .calls
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let id = format!("c{}", i + 1);
            let risk_level = req
                .available_tools
                .iter()
                .find(|t| t.service_id == c.service_id && t.tool.name == c.tool_name)
                .map(|t| t.tool.risk_level.unwrap_or(t.risk_level))
                .unwrap_or(RiskLevel::Low);
            let schema = req
                .available_tools
                .iter()
                .find(|t| t.service_id == c.service_id && t.tool.name == c.tool_name)
                .map(|t| &t.tool);
            let params = match schema {
                Some(schema) => parameter_validator::coerce_params(c.params, schema),
                None => c.params,
            };
            ToolCall {
                id,
                service_id: c.service_id,
                tool_name: c.tool_name,
                params,
                depends_on: c.depends_on,
                risk_level,
            }
        })
        .collect();

    let execution_order = compute_execution_order(&tool_calls);
    let execution_mode = parse_execution_mode(parsed.execution_mode.as_deref(), tool_calls.len());

    Plan {
        id: Uuid::new_v4().to_string(),
        message: req.message.to_string(),
        tool_calls,
        execution_mode,
        execution_order,
        confidence: parsed.confidence,
        reasoning: parsed.reasoning,
        created_at: now,
    }
}

fn empty_plan(message: &str, reasoning: &str) -> Plan {
    Plan {
        id: Uuid::new_v4().to_string(),
        message: message.to_string(),
        tool_calls: vec![],
        execution_mode: ExecutionMode::Single,
        execution_order: vec![],
        confidence: 0.0,
        reasoning: reasoning.to_string(),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use yukie_domain::model::{ParamType, Parameter, ToolSchema};
    use yukie_providers::{ChatResponse, NullProvider};

    fn auth() -> AuthContext {
        AuthContext {
            user_id: "u1".into(),
            scopes: HashSet::new(),
            request_id: None,
            utc_offset_minutes: None,
        }
    }

    fn tool_schema(name: &str) -> yukie_domain::model::ToolSchema {
        ToolSchema {
            name: name.into(),
            description: "logs a habit".into(),
            parameters: vec![Parameter {
                name: "category".into(),
                param_type: ParamType::String,
                required: true,
                description: String::new(),
                default: None,
                enum_values: None,
                min: None,
                max: None,
                pattern: None,
            }],
            required_scopes: vec![],
            returns_async: false,
            examples: vec![],
            risk_level: None,
        }
    }

    #[tokio::test]
    async fn single_tool_llm_failure_falls_back_to_empty_params() {
        let llm: Arc<dyn LlmProvider> = Arc::new(NullProvider);
        let tools = vec![AvailableTool {
            service_id: "habit-svc".into(),
            tool: tool_schema("habit.log"),
            risk_level: RiskLevel::Low,
        }];
        let auth_ctx = auth();
        let p = plan(
            &llm,
            PlanRequest {
                message: "log gaming",
                auth: &auth_ctx,
                available_tools: &tools,
                model: None,
                max_tools: None,
            },
        )
        .await;
        assert_eq!(p.tool_calls.len(), 1);
        assert_eq!(p.execution_mode, ExecutionMode::Single);
        assert!(p.tool_calls[0].params.is_empty());
    }

    struct StubProvider(String);

    #[async_trait::async_trait]
    impl LlmProvider for StubProvider {
        async fn chat(&self, _req: ChatRequest) -> yukie_domain::Result<ChatResponse> {
            Ok(ChatResponse {
                content: self.0.clone(),
                model: "stub".into(),
                finish_reason: None,
            })
        }
        fn provider_id(&self) -> &str {
            "stub"
        }
    }

    #[tokio::test]
    async fn single_tool_extracts_params_from_llm_json() {
        let llm: Arc<dyn LlmProvider> =
            Arc::new(StubProvider(r#"{"params": {"category": "prod"}}"#.to_string()));
        let tools = vec![AvailableTool {
            service_id: "habit-svc".into(),
            tool: tool_schema("habit.log"),
            risk_level: RiskLevel::Low,
        }];
        let auth_ctx = auth();
        let p = plan(
            &llm,
            PlanRequest {
                message: "log coding",
                auth: &auth_ctx,
                available_tools: &tools,
                model: None,
                max_tools: None,
            },
        )
        .await;
        assert_eq!(p.tool_calls[0].params.get("category").unwrap(), "prod");
    }

    #[tokio::test]
    async fn multi_tool_plan_builds_dependency_layering() {
        let llm: Arc<dyn LlmProvider> = Arc::new(StubProvider(
            r#"{
                "calls": [
                    {"serviceId": "habit-svc", "toolName": "habit.checkin", "params": {"category": "prod"}},
                    {"serviceId": "habit-svc", "toolName": "habit.stats", "params": {"category": "${c1.result.category}"}, "dependsOn": ["c1"]}
                ],
                "executionMode": "sequential",
                "confidence": 0.8,
                "reasoning": "check in then show stats"
            }"#
            .to_string(),
        ));
        let tools = vec![
            AvailableTool {
                service_id: "habit-svc".into(),
                tool: tool_schema("habit.checkin"),
                risk_level: RiskLevel::Low,
            },
            AvailableTool {
                service_id: "habit-svc".into(),
                tool: tool_schema("habit.stats"),
                risk_level: RiskLevel::Low,
            },
        ];
        let auth_ctx = auth();
        let p = plan(
            &llm,
            PlanRequest {
                message: "check in my habit and then show my stats",
                auth: &auth_ctx,
                available_tools: &tools,
                model: None,
                max_tools: None,
            },
        )
        .await;
        assert_eq!(p.tool_calls.len(), 2);
        assert_eq!(p.execution_order, vec![vec!["c1".to_string()], vec!["c2".to_string()]]);
        assert!(p.check_invariants().is_empty());
    }

    #[test]
    fn execution_order_puts_cycle_members_in_trailing_singleton_groups() {
        let mut c1 = ToolCall {
            id: "c1".into(),
            service_id: "svc".into(),
            tool_name: "t".into(),
            params: HashMap::new(),
            depends_on: vec!["c2".into()],
            risk_level: RiskLevel::Low,
        };
        let c2 = ToolCall {
            id: "c2".into(),
            service_id: "svc".into(),
            tool_name: "t".into(),
            params: HashMap::new(),
            depends_on: vec!["c1".into()],
            risk_level: RiskLevel::Low,
        };
        c1.depends_on = vec!["c2".into()];
        let order = compute_execution_order(&[c1, c2]);
        // Every id still appears exactly once even though neither can
        // ever become "ready" — downstream validation rejects the cycle.
        let flat: Vec<&String> = order.iter().flatten().collect();
        assert_eq!(flat.len(), 2);
    }
}
