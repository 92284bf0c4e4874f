//! Shared error type and HTTP/stage disposition mapping.
//!
//! Every fallible path in the core crosses a component boundary as this
//! type; handlers are the only place it gets turned into an HTTP response.

use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("rate limited, retry after {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("registry init failed: {0}")]
    RegistryInit(String),

    #[error("llm rate limited")]
    LlmRateLimit,

    #[error("llm auth failed")]
    LlmAuth,

    #[error("llm overloaded")]
    LlmOverload,

    #[error("invocation failed: {code}: {message}")]
    InvocationFailed {
        code: String,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("execution error: {0}")]
    ExecutionError(String),

    #[error("plan validation failed: {0:?}")]
    ValidationError(Vec<String>),

    #[error("security blocked: {0:?}")]
    SecurityBlocked(Vec<String>),

    #[error("confirmation denied: {0:?}")]
    ConfirmationDenied(Option<String>),

    #[error("confirmation expired")]
    ConfirmationExpired,

    #[error("other: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Stage label used in the `/chat` error envelope (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RegistryInit,
    LlmRateLimit,
    LlmAuth,
    Timeout,
    Network,
    NotFound,
    ProcessChat,
    Unknown,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::RegistryInit => "registry_init",
            Stage::LlmRateLimit => "llm_rate_limit",
            Stage::LlmAuth => "llm_auth",
            Stage::Timeout => "timeout",
            Stage::Network => "network",
            Stage::NotFound => "not_found",
            Stage::ProcessChat => "process_chat",
            Stage::Unknown => "unknown",
        }
    }
}

impl Error {
    /// HTTP status code this error maps to (spec §7 disposition table).
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Unauthenticated(_) => 401,
            Error::Forbidden(_) => 403,
            Error::RateLimited { .. } => 429,
            Error::BadRequest(_) => 400,
            Error::RegistryInit(_) => 500,
            Error::LlmRateLimit | Error::LlmAuth | Error::LlmOverload => 500,
            Error::ValidationError(_) => 400,
            Error::ConfirmationDenied(_) | Error::ConfirmationExpired => 409,
            Error::Timeout(_) => 504,
            Error::Io(_) | Error::Json(_) | Error::Http(_) | Error::Config(_) => 500,
            Error::InvocationFailed { .. }
            | Error::ExecutionError(_)
            | Error::SecurityBlocked(_) => 200, // recorded on the result, plan continues
            Error::Other(_) => 500,
        }
    }

    /// Stage label for the error envelope.
    pub fn stage(&self) -> Stage {
        match self {
            Error::RegistryInit(_) => Stage::RegistryInit,
            Error::LlmRateLimit => Stage::LlmRateLimit,
            Error::LlmAuth => Stage::LlmAuth,
            Error::Timeout(_) => Stage::Timeout,
            Error::Http(_) | Error::Io(_) => Stage::Network,
            Error::BadRequest(_) => Stage::NotFound,
            _ => Stage::Unknown,
        }
    }
}
