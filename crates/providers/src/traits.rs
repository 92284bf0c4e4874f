//! Provider-agnostic chat completion seam.
//!
//! Concrete vendor backends (Anthropic, OpenAI, ...) are out of scope —
//! they are external collaborators specified only as a capability. This
//! crate carries only the trait every call site (retrieval router,
//! planner, composer) programs against.

use yukie_domain::Result;

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// System + user messages, in order. Kept as plain role/content pairs
    /// rather than a richer `Message` enum since every call site here is a
    /// single-turn strict-JSON or short-text prompt, not a multi-turn
    /// conversation.
    pub messages: Vec<(Role, String)>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub json_mode: bool,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub finish_reason: Option<String>,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        ChatRequest {
            messages: vec![(Role::System, system.into()), (Role::User, user.into())],
            ..Default::default()
        }
    }
}

/// Trait every LLM adapter implements. Adapters themselves live outside
/// this crate's scope; callers receive an `Arc<dyn LlmProvider>`.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse>;

    fn provider_id(&self) -> &str;
}

/// Test double used across router/planner/composer unit tests and as the
/// default when no provider is configured.
pub struct NullProvider;

#[async_trait::async_trait]
impl LlmProvider for NullProvider {
    async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse> {
        Err(yukie_domain::Error::LlmOverload)
    }

    fn provider_id(&self) -> &str {
        "null"
    }
}
