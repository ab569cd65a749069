use thiserror::Error;
use uuid::Uuid;

use crate::webhook::HttpMethod;

/// Hint attached to every not-registered response.
pub const NOT_REGISTERED_HINT: &str = "Click the 'Listen for test event' button in the editor, \
then make the request again. In test mode a webhook only works for one call after you click the button.";

/// Errors surfaced by the test-webhook registry.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// No active test registration matches the call.
    #[error("the requested webhook \"{method} {path}\" is not registered")]
    NotRegistered { method: String, path: String },

    /// The workflow was armed before being saved.
    #[error("workflow must be saved before its webhooks can be tested")]
    WorkflowNotSaved,

    /// A matched registration points at a node its snapshot does not contain.
    #[error("trigger node '{node}' not found in workflow {workflow_id}")]
    TriggerNodeMissing { workflow_id: Uuid, node: String },

    /// The workflow's test webhooks were torn down while the arm call was
    /// still registering them.
    #[error("test webhooks of workflow {workflow_id} were removed while being armed")]
    ArmInterrupted { workflow_id: Uuid },

    /// Registering a route with the active-route table failed during arm.
    #[error("webhook registration failed: {0}")]
    Registration(#[from] RouteError),

    /// The executor failed to run the workflow.
    #[error("workflow execution failed: {0}")]
    Executor(#[from] ExecutorError),
}

impl WebhookError {
    pub fn not_registered(method: HttpMethod, path: &str) -> Self {
        WebhookError::NotRegistered {
            method: method.to_string(),
            path: path.to_string(),
        }
    }

    /// Not-registered for a path queried without a method.
    pub fn path_not_registered(path: &str) -> Self {
        WebhookError::NotRegistered {
            method: "ANY".to_string(),
            path: path.to_string(),
        }
    }

    /// HTTP status the error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::NotRegistered { .. } => 404,
            WebhookError::Executor(_) => 500,
            WebhookError::Registration(RouteError::PathInUse { .. })
            | WebhookError::ArmInterrupted { .. } => 409,
            WebhookError::Registration(_)
            | WebhookError::WorkflowNotSaved
            | WebhookError::TriggerNodeMissing { .. } => 500,
        }
    }

    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            WebhookError::NotRegistered { .. } => "WEBHOOK_NOT_REGISTERED",
            WebhookError::WorkflowNotSaved => "WORKFLOW_NOT_SAVED",
            WebhookError::TriggerNodeMissing { .. } => "TRIGGER_NODE_MISSING",
            WebhookError::ArmInterrupted { .. } => "ARM_INTERRUPTED",
            WebhookError::Registration(_) => "WEBHOOK_REGISTRATION_FAILED",
            WebhookError::Executor(_) => "EXECUTION_FAILED",
        }
    }

    /// User-facing hint. Only not-registered errors carry one.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            WebhookError::NotRegistered { .. } => Some(NOT_REGISTERED_HINT),
            _ => None,
        }
    }
}

/// Errors from the active-route table.
#[derive(Debug, Clone, Error)]
pub enum RouteError {
    #[error("the path \"{path}\" is already in use by workflow {workflow_id}")]
    PathInUse { path: String, workflow_id: Uuid },

    #[error("route table unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

/// Errors from the workflow executor.
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    #[error("{0}")]
    Failed(String),

    #[error("executor panicked")]
    Panicked,

    #[error("execution task aborted: {0}")]
    Aborted(String),
}

/// Errors delivering a push event.
#[derive(Debug, Clone, Error)]
pub enum PushError {
    #[error("session '{0}' is not connected")]
    SessionNotConnected(String),

    #[error("push channel closed")]
    Closed,
}
