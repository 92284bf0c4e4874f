pub mod plan;
pub mod security;
pub mod service;

pub use plan::{ExecutionMode, Plan, ToolCall, ToolCallResult, ToolError, WorkingState};
pub use security::{
    AuditEntry, AuditKind, AuthContext, ConfirmationRequest, ConfirmationResponse,
    ConfirmationStatus, RateLimitCounter, RiskAssessment,
};
pub use service::{
    ActionDef, ActionsResponse, AuthMethod, CandidateTool, Parameter, ParamType, RegistryStats,
    RiskLevel, ServiceAuth, ServiceDefinition, ServiceEndpoints, ToolManifest, ToolSchema,
    Transport,
};
