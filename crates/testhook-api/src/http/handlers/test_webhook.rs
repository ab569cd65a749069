//! Management endpoints for test webhooks: arm, list, cancel.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use testhook_core::webhook::ArmRequest;
use testhook_types::workflow::{ActivationMode, ExecuteMode, Workflow, WorkflowData};

use crate::http::error::AppError;
use crate::http::response::{
    ApiResponse, ArmResponse, ArmedWorkflowSummary, CancelResponse, RequestScope,
};
use crate::state::AppState;

/// Request body for arming a workflow's test webhooks.
#[derive(Debug, Deserialize)]
pub struct ArmTestWebhookRequest {
    pub workflow: Workflow,
    #[serde(default)]
    pub workflow_data: Option<WorkflowData>,
    /// Editor session to notify when the webhook fires or is removed.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Only arm webhooks feeding this node.
    #[serde(default)]
    pub target_node: Option<String>,
    #[serde(default)]
    pub mode: Option<ExecuteMode>,
    #[serde(default)]
    pub activation: Option<ActivationMode>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// POST /api/v1/test-webhooks - Arm a workflow and wait for one test call.
pub async fn arm_test_webhook(
    State(state): State<AppState>,
    Json(body): Json<ArmTestWebhookRequest>,
) -> Result<ApiResponse<ArmResponse>, AppError> {
    let scope = RequestScope::begin();

    if body.workflow.name.trim().is_empty() {
        return Err(AppError::Validation("workflow name must not be empty".to_string()));
    }

    let workflow_id = body.workflow.id;
    let mut request = ArmRequest::new(body.workflow)
        .with_workflow_data(body.workflow_data.unwrap_or_default())
        .with_context(state.execution_context(body.user_id))
        .with_modes(
            body.mode.unwrap_or_default(),
            body.activation.unwrap_or_default(),
        );
    if let Some(session_id) = body.session_id {
        request = request.with_session(session_id);
    }
    if let Some(node) = body.target_node {
        request = request.with_target_node(node);
    }

    let waiting = state.test_webhooks.arm(request).await?;
    tracing::debug!(request_id = scope.request_id(), waiting, "arm request handled");

    let mut resp = scope.respond(ArmResponse {
        waiting_for_webhook: waiting,
        expires_in_secs: waiting.then(|| state.test_webhooks.timeout().as_secs()),
    });
    if let (true, Some(id)) = (waiting, workflow_id) {
        resp = resp.with_link("cancel", format!("/api/v1/test-webhooks/{id}"));
    }
    Ok(resp)
}

/// GET /api/v1/test-webhooks - List armed workflows and their keys.
pub async fn list_test_webhooks(
    State(state): State<AppState>,
) -> ApiResponse<Vec<ArmedWorkflowSummary>> {
    let scope = RequestScope::begin();

    let mut armed = state.test_webhooks.armed_workflows().await;
    armed.sort_by_key(|w| w.workflow_id);

    scope.respond(armed.into_iter().map(ArmedWorkflowSummary::from).collect())
}

/// DELETE /api/v1/test-webhooks/{workflow_id} - Stop waiting for a test call.
pub async fn cancel_test_webhook(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<ApiResponse<CancelResponse>, AppError> {
    let scope = RequestScope::begin();

    let workflow_id: Uuid = workflow_id
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid workflow id: {workflow_id}")))?;

    let canceled = state.test_webhooks.cancel(workflow_id).await;
    Ok(scope.respond(CancelResponse { canceled }))
}
