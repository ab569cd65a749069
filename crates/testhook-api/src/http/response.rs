//! Management API envelope and payloads.
//!
//! Every `/api/v1` response is wrapped in the same envelope:
//! ```json
//! {
//!   "data": { "waiting_for_webhook": true, "expires_in_secs": 120 },
//!   "meta": { "request_id": "...", "timestamp": "...", "response_time_ms": 1 },
//!   "_links": { "cancel": "/api/v1/test-webhooks/..." }
//! }
//! ```
//! Failed calls carry `errors` instead of `data`. Test webhook calls
//! themselves never use the envelope; see [`crate::http::error`].

use std::collections::BTreeMap;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

use testhook_core::webhook::ArmedWorkflow;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip)]
    status: StatusCode,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    pub meta: ApiMeta,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiErrorDetail>,

    /// Follow-up actions on the returned resource, keyed by relation.
    #[serde(rename = "_links", skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
pub struct ApiMeta {
    pub request_id: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub response_time_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable, e.g. `VALIDATION_ERROR`.
    pub code: &'static str,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn with_link(mut self, rel: &'static str, href: impl Into<String>) -> Self {
        self.links.insert(rel, href.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = serde_json::to_string(&self).unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to serialize API response");
            r#"{"errors":[{"code":"SERIALIZATION_ERROR","message":"Failed to serialize response"}]}"#
                .to_string()
        });

        (
            self.status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}

/// Request id and clock for one management call.
///
/// Handlers open a scope on entry and close it with [`RequestScope::respond`]
/// or [`RequestScope::fail`], which stamp the envelope metadata.
#[derive(Debug)]
pub struct RequestScope {
    request_id: String,
    start: Instant,
}

impl RequestScope {
    pub fn begin() -> Self {
        Self {
            request_id: Uuid::now_v7().to_string(),
            start: Instant::now(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn respond<T: Serialize>(self, data: T) -> ApiResponse<T> {
        ApiResponse {
            status: StatusCode::OK,
            data: Some(data),
            meta: self.meta(),
            errors: Vec::new(),
            links: BTreeMap::new(),
        }
    }

    pub fn fail(self, status: StatusCode, code: &'static str, message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            status,
            data: None,
            meta: self.meta(),
            errors: vec![ApiErrorDetail {
                code,
                message: message.into(),
            }],
            links: BTreeMap::new(),
        }
    }

    fn meta(self) -> ApiMeta {
        ApiMeta {
            response_time_ms: self.start.elapsed().as_millis() as u64,
            request_id: self.request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Result of arming a workflow.
#[derive(Debug, Serialize)]
pub struct ArmResponse {
    /// `false` when the workflow has no webhook and should run right away.
    pub waiting_for_webhook: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<u64>,
}

/// One armed workflow in the list endpoint.
#[derive(Debug, Serialize)]
pub struct ArmedWorkflowSummary {
    pub workflow_id: Uuid,
    pub name: String,
    /// Registration keys, sorted.
    pub keys: Vec<String>,
}

impl From<ArmedWorkflow> for ArmedWorkflowSummary {
    fn from(armed: ArmedWorkflow) -> Self {
        let mut keys: Vec<String> = armed.keys.iter().map(ToString::to_string).collect();
        keys.sort();
        Self {
            workflow_id: armed.workflow_id,
            name: armed.name,
            keys,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub canceled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use testhook_types::webhook::{HttpMethod, RegistrationKey, RouteKey};

    #[test]
    fn respond_serializes_data_meta_and_links() {
        let scope = RequestScope::begin();
        let request_id = scope.request_id().to_string();
        let resp = scope
            .respond(ArmResponse {
                waiting_for_webhook: true,
                expires_in_secs: Some(120),
            })
            .with_link("cancel", "/api/v1/test-webhooks/x");

        assert_eq!(resp.status(), StatusCode::OK);
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["data"]["waiting_for_webhook"], true);
        assert_eq!(value["data"]["expires_in_secs"], 120);
        assert_eq!(value["meta"]["request_id"], request_id);
        assert_eq!(value["_links"]["cancel"], "/api/v1/test-webhooks/x");
        assert!(value.get("errors").is_none());
        assert!(value.get("status").is_none());
    }

    #[test]
    fn not_waiting_omits_expiry() {
        let resp = RequestScope::begin().respond(ArmResponse {
            waiting_for_webhook: false,
            expires_in_secs: None,
        });
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value["data"].get("expires_in_secs").is_none());
        assert!(value.get("_links").is_none());
    }

    #[test]
    fn fail_carries_status_and_error() {
        let resp = RequestScope::begin().fail(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "bad id");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["errors"][0]["code"], "VALIDATION_ERROR");
        assert!(value.get("data").is_none());
        assert_eq!(resp.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn summary_sorts_keys() {
        let workflow_id = Uuid::now_v7();
        let keys: HashSet<RegistrationKey> = [HttpMethod::Post, HttpMethod::Get]
            .into_iter()
            .map(|method| RegistrationKey {
                route: RouteKey::fixed(method, "orders"),
                workflow_id,
            })
            .collect();
        let armed = ArmedWorkflow {
            workflow_id,
            name: "orders".to_string(),
            keys,
        };

        let summary = ArmedWorkflowSummary::from(armed);
        assert_eq!(summary.workflow_id, workflow_id);
        assert_eq!(
            summary.keys,
            vec![
                format!("GET|orders|{workflow_id}"),
                format!("POST|orders|{workflow_id}"),
            ]
        );
    }
}
