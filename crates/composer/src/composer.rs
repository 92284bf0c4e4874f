//! LLM-driven reply formatting with deterministic fallback (spec §4.11).

use serde_json::Value;
use std::sync::Arc;
use yukie_domain::model::ToolCallResult;
use yukie_providers::{ChatRequest, LlmProvider};

const SINGLE_TEMPERATURE: f32 = 0.7;
const SINGLE_MAX_TOKENS: u32 = 512;

fn apology(result: &ToolCallResult) -> String {
    let message = result
        .error
        .as_ref()
        .map(|e| e.message.as_str())
        .unwrap_or("the tool call failed");
    format!("Sorry, I wasn't able to do that: {message}")
}

/// Deterministic rendering of a single successful result, used both as
/// the LLM-failure fallback and (implicitly) as the input description
/// handed to the LLM prompt.
fn deterministic_single(result: &ToolCallResult) -> String {
    let Some(data) = &result.result else {
        return "Done.".to_string();
    };
    match data {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            if let Some(Value::String(message)) = map.get("message") {
                message.clone()
            } else if let Some(data_field) = map.get("data") {
                serde_json::to_string_pretty(data_field).unwrap_or_else(|_| data_field.to_string())
            } else {
                data.to_string()
            }
        }
        other => other.to_string(),
    }
}

/// Renders a single tool call result into a user-facing reply. Failed
/// results always use the fixed apology template — they never reach the
/// LLM, since there's nothing useful to summarise.
pub async fn compose_single(
    llm: &Arc<dyn LlmProvider>,
    original_message: &str,
    service_id: &str,
    tool_name: &str,
    result: &ToolCallResult,
    model: Option<String>,
) -> String {
    if !result.success {
        return apology(result);
    }

    let prompt = format!(
        "The user asked: \"{original_message}\"\n\n\
         The tool `{service_id}.{tool_name}` ran and returned this result:\n{}\n\n\
         Write a short, conversational reply to the user summarising what happened. \
         Do not mention tool or service names.",
        result
            .result
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "null".to_string())
    );

    let mut chat_req = ChatRequest::new(
        "You write brief, friendly replies summarising the outcome of an action just taken on the user's behalf.",
        prompt,
    );
    chat_req.temperature = Some(SINGLE_TEMPERATURE);
    chat_req.max_tokens = Some(SINGLE_MAX_TOKENS);
    chat_req.model = model;

    match llm.chat(chat_req).await {
        Ok(resp) if !resp.content.trim().is_empty() => resp.content,
        Ok(_) => deterministic_single(result),
        Err(err) => {
            tracing::warn!(error = %err, "composer LLM call failed, using deterministic fallback");
            deterministic_single(result)
        }
    }
}

fn deterministic_overview(results: &[ToolCallResult]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut failures = 0usize;
    for result in results {
        if result.success {
            lines.push(format!("- {}: {}", result.tool_name, deterministic_single(result)));
        } else {
            failures += 1;
            lines.push(format!("- {}: {}", result.tool_name, apology(result)));
        }
    }
    if failures > 0 {
        lines.push(format!("({failures} action(s) failed)"));
    }
    lines.join("\n")
}

fn overview_prompt(original_message: &str, results: &[ToolCallResult]) -> String {
    let listing: Vec<String> = results
        .iter()
        .map(|r| {
            format!(
                "- {} ({}): {} — {}",
                r.tool_name,
                r.service_id,
                if r.success { "succeeded" } else { "failed" },
                r.result
                    .as_ref()
                    .map(|v| v.to_string())
                    .or_else(|| r.error.as_ref().map(|e| e.message.clone()))
                    .unwrap_or_default()
            )
        })
        .collect();
    format!(
        "The user asked: \"{original_message}\"\n\nThese actions were taken:\n{}\n\n\
         Write a short, conversational summary of what happened overall. \
         Do not mention tool or service names.",
        listing.join("\n")
    )
}

/// Renders a multi-call plan's results into one reply.
pub async fn compose_overview(
    llm: &Arc<dyn LlmProvider>,
    original_message: &str,
    results: &[ToolCallResult],
    model: Option<String>,
) -> String {
    if results.is_empty() {
        return "I didn't take any actions for that request.".to_string();
    }

    let mut chat_req = ChatRequest::new(
        "You write brief, friendly summaries of several actions just taken on the user's behalf.",
        overview_prompt(original_message, results),
    );
    chat_req.temperature = Some(SINGLE_TEMPERATURE);
    chat_req.max_tokens = Some(SINGLE_MAX_TOKENS);
    chat_req.model = model;

    match llm.chat(chat_req).await {
        Ok(resp) if !resp.content.trim().is_empty() => resp.content,
        Ok(_) => deterministic_overview(results),
        Err(err) => {
            tracing::warn!(error = %err, "composer overview LLM call failed, using deterministic fallback");
            deterministic_overview(results)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yukie_domain::model::ToolError;
    use yukie_providers::{ChatResponse, NullProvider};

    fn ok_result(tool_name: &str, data: Value) -> ToolCallResult {
        ToolCallResult {
            id: "c1".into(),
            service_id: "habit-svc".into(),
            tool_name: tool_name.into(),
            success: true,
            result: Some(data),
            error: None,
            duration_ms: 10,
        }
    }

    fn failed_result(tool_name: &str, message: &str) -> ToolCallResult {
        ToolCallResult {
            id: "c1".into(),
            service_id: "habit-svc".into(),
            tool_name: tool_name.into(),
            success: false,
            result: None,
            error: Some(ToolError {
                code: "EXECUTION_ERROR".into(),
                message: message.into(),
                details: None,
            }),
            duration_ms: 10,
        }
    }

    #[tokio::test]
    async fn failed_result_uses_apology_without_calling_llm() {
        let llm: Arc<dyn LlmProvider> = Arc::new(NullProvider);
        let result = failed_result("habit.log", "service unreachable");
        let reply = compose_single(&llm, "log my habit", "habit-svc", "habit.log", &result, None).await;
        assert!(reply.contains("service unreachable"));
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_message_field() {
        let llm: Arc<dyn LlmProvider> = Arc::new(NullProvider);
        let result = ok_result("habit.log", serde_json::json!({"message": "logged it!"}));
        let reply = compose_single(&llm, "log my habit", "habit-svc", "habit.log", &result, None).await;
        assert_eq!(reply, "logged it!");
    }

    #[tokio::test]
    async fn llm_failure_with_string_result_uses_it_directly() {
        let llm: Arc<dyn LlmProvider> = Arc::new(NullProvider);
        let result = ok_result("habit.log", serde_json::json!("all set"));
        let reply = compose_single(&llm, "log my habit", "habit-svc", "habit.log", &result, None).await;
        assert_eq!(reply, "all set");
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
    async fn successful_llm_reply_is_used_verbatim() {
        let llm: Arc<dyn LlmProvider> = Arc::new(StubProvider("Logged your coding habit!".to_string()));
        let result = ok_result("habit.log", serde_json::json!({"message": "logged it!"}));
        let reply = compose_single(&llm, "log my habit", "habit-svc", "habit.log", &result, None).await;
        assert_eq!(reply, "Logged your coding habit!");
    }

    #[tokio::test]
    async fn overview_fallback_lists_failures_with_footer() {
        let llm: Arc<dyn LlmProvider> = Arc::new(NullProvider);
        let results = vec![
            ok_result("habit.checkin", serde_json::json!({"message": "checked in"})),
            failed_result("habit.stats", "timeout"),
        ];
        let reply = compose_overview(&llm, "check in and show stats", &results, None).await;
        assert!(reply.contains("(1 action(s) failed)"));
        assert!(reply.contains("checked in"));
    }

    #[tokio::test]
    async fn overview_with_no_results_has_a_fixed_message() {
        let llm: Arc<dyn LlmProvider> = Arc::new(NullProvider);
        let reply = compose_overview(&llm, "do nothing", &[], None).await;
        assert_eq!(reply, "I didn't take any actions for that request.");
    }
}
