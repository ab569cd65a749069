//! Port to the workflow executor.

use std::future::Future;
use std::sync::Arc;

use testhook_types::error::ExecutorError;
use testhook_types::webhook::{WebhookDescriptor, WebhookRequest, WebhookResponse};
use testhook_types::workflow::{ExecuteMode, SessionId, Workflow, WorkflowData, WorkflowNode};

/// Everything the executor needs to run one webhook-triggered execution.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub workflow: Arc<Workflow>,
    pub workflow_data: Arc<WorkflowData>,
    pub descriptor: WebhookDescriptor,
    pub trigger_node: WorkflowNode,
    pub mode: ExecuteMode,
    pub session_id: Option<SessionId>,
    /// The incoming call, with path parameters already bound.
    pub request: WebhookRequest,
}

/// Result of handing a webhook call to the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// An execution was started.
    Started {
        execution_id: String,
        response: WebhookResponse,
    },
    /// The call was answered without starting an execution (handshake or
    /// probe). The registration stays armed for the next call.
    NoExecution { response: WebhookResponse },
}

impl ExecutionOutcome {
    pub fn response(&self) -> &WebhookResponse {
        match self {
            ExecutionOutcome::Started { response, .. }
            | ExecutionOutcome::NoExecution { response } => response,
        }
    }

    pub fn execution_id(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Started { execution_id, .. } => Some(execution_id),
            ExecutionOutcome::NoExecution { .. } => None,
        }
    }
}

/// Runs workflows triggered by test webhooks.
pub trait WebhookExecutor: Send + Sync {
    fn execute(
        &self,
        request: ExecutionRequest,
    ) -> impl Future<Output = Result<ExecutionOutcome, ExecutorError>> + Send;
}
