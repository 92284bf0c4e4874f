//! Converts a [`yukie_domain::Error`] into the `/chat`-family error
//! envelope from spec §6: `{error, message, stage?, detail?}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};
use yukie_domain::Error;

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

fn error_code(err: &Error) -> &'static str {
    match err {
        Error::Unauthenticated(_) => "unauthenticated",
        Error::Forbidden(_) => "forbidden",
        Error::RateLimited { .. } => "rate_limited",
        Error::BadRequest(_) => "bad_request",
        Error::RegistryInit(_) => "registry_init",
        Error::LlmRateLimit => "llm_rate_limit",
        Error::LlmAuth => "llm_auth",
        Error::LlmOverload => "llm_overload",
        Error::ValidationError(_) => "validation_error",
        Error::SecurityBlocked(_) => "security_blocked",
        Error::ConfirmationDenied(_) => "confirmation_denied",
        Error::ConfirmationExpired => "confirmation_expired",
        Error::Timeout(_) => "timeout",
        Error::Io(_) | Error::Json(_) | Error::Http(_) | Error::Config(_) => "internal_error",
        Error::InvocationFailed { .. } | Error::ExecutionError(_) => "execution_error",
        Error::Other(_) => "internal_error",
    }
}

fn detail(err: &Error) -> Option<Value> {
    match err {
        Error::ValidationError(messages) | Error::SecurityBlocked(messages) => Some(json!(messages)),
        Error::InvocationFailed { details, .. } => details.clone(),
        _ => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "error": error_code(&err),
            "message": err.to_string(),
            "stage": err.stage().as_str(),
            "detail": detail(&err),
        });
        (status, Json(body)).into_response()
    }
}
