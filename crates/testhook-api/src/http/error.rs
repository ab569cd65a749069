//! Application error type mapping to HTTP status codes.
//!
//! Registry errors render as `{message, httpStatus, errorCode, hint?}` so a
//! webhook caller sees the same shape whichever route failed. Other errors use
//! the management API envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use testhook_types::error::WebhookError;

use crate::http::response::RequestScope;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Test-webhook registry errors.
    Webhook(WebhookError),
    /// Malformed management request.
    Validation(String),
}

impl From<WebhookError> for AppError {
    fn from(e: WebhookError) -> Self {
        AppError::Webhook(e)
    }
}

/// JSON body for a registry error.
pub fn webhook_error_body(err: &WebhookError) -> serde_json::Value {
    let mut body = json!({
        "message": err.to_string(),
        "httpStatus": err.status_code(),
        "errorCode": err.error_code(),
    });
    if let Some(hint) = err.hint() {
        body["hint"] = json!(hint);
    }
    body
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Webhook(err) => {
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    tracing::error!(error = %err, code = err.error_code(), "test webhook request failed");
                }
                (status, Json(webhook_error_body(&err))).into_response()
            }
            AppError::Validation(msg) => RequestScope::begin()
                .fail(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
                .into_response(),
        }
    }
}
