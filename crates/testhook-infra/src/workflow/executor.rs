//! Local webhook executor.
//!
//! Starts an execution for every webhook call by recording it in memory with
//! a time-sortable UUIDv7 id, then answers the caller the way a webhook node
//! configured to respond immediately would. `HEAD` probes are answered
//! without starting anything so the test webhook stays armed.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Value, json};
use uuid::Uuid;

use testhook_core::webhook::executor::{ExecutionOutcome, ExecutionRequest, WebhookExecutor};
use testhook_types::error::ExecutorError;
use testhook_types::webhook::{HttpMethod, WebhookResponse};
use testhook_types::workflow::{ExecuteMode, SessionId};

/// Default status code when the trigger node sets no `responseCode`.
const DEFAULT_RESPONSE_CODE: u16 = 200;

/// One execution started by a webhook call.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub workflow_id: Uuid,
    pub workflow_name: String,
    pub trigger_node: String,
    pub mode: ExecuteMode,
    pub session_id: Option<SessionId>,
    pub method: HttpMethod,
    pub path: String,
    pub params: HashMap<String, String>,
    pub payload: Value,
    pub started_at: DateTime<Utc>,
}

/// In-process executor that records executions.
pub struct LocalExecutor {
    executions: Arc<DashMap<String, ExecutionRecord>>,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self {
            executions: Arc::new(DashMap::new()),
        }
    }

    pub fn get(&self, execution_id: &str) -> Option<ExecutionRecord> {
        self.executions.get(execution_id).map(|r| r.value().clone())
    }

    /// Executions of `workflow_id`, oldest first.
    pub fn executions_for(&self, workflow_id: Uuid) -> Vec<ExecutionRecord> {
        let mut records: Vec<ExecutionRecord> = self
            .executions
            .iter()
            .filter(|r| r.value().workflow_id == workflow_id)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| a.execution_id.cmp(&b.execution_id));
        records
    }

    pub fn len(&self) -> usize {
        self.executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookExecutor for LocalExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionOutcome, ExecutorError> {
        if request.request.method == HttpMethod::Head {
            return Ok(ExecutionOutcome::NoExecution {
                response: WebhookResponse::empty(DEFAULT_RESPONSE_CODE),
            });
        }

        let workflow_id = request
            .workflow
            .id
            .ok_or_else(|| ExecutorError::Failed("workflow has no id".to_string()))?;
        let status = response_code(&request.trigger_node.parameters)?;

        let execution_id = Uuid::now_v7().to_string();
        let record = ExecutionRecord {
            execution_id: execution_id.clone(),
            workflow_id,
            workflow_name: request.workflow.name.clone(),
            trigger_node: request.trigger_node.name.clone(),
            mode: request.mode,
            session_id: request.session_id.clone(),
            method: request.request.method,
            path: request.request.path.clone(),
            params: request.request.params.clone(),
            payload: request.request.body,
            started_at: Utc::now(),
        };
        self.executions.insert(execution_id.clone(), record);

        tracing::info!(
            %execution_id,
            %workflow_id,
            trigger = %request.trigger_node.name,
            "execution started"
        );

        Ok(ExecutionOutcome::Started {
            response: WebhookResponse::json(
                status,
                json!({
                    "message": "Workflow was started",
                    "executionId": execution_id,
                }),
            ),
            execution_id,
        })
    }
}

fn response_code(parameters: &Value) -> Result<u16, ExecutorError> {
    match parameters.get("responseCode") {
        None | Some(Value::Null) => Ok(DEFAULT_RESPONSE_CODE),
        Some(code) => code
            .as_u64()
            .and_then(|c| u16::try_from(c).ok())
            .filter(|c| (100..=599).contains(c))
            .ok_or_else(|| ExecutorError::Failed(format!("invalid responseCode: {code}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testhook_types::webhook::{WebhookDescriptor, WebhookRequest};
    use testhook_types::workflow::{Workflow, WorkflowData, WorkflowNode};

    fn request(method: HttpMethod, parameters: Value) -> ExecutionRequest {
        let workflow_id = Uuid::now_v7();
        let node = WorkflowNode {
            name: "Webhook".to_string(),
            node_type: "webhook".to_string(),
            disabled: false,
            parameters,
            webhook_id: None,
        };
        ExecutionRequest {
            workflow: Arc::new(Workflow {
                id: Some(workflow_id),
                name: "orders".to_string(),
                nodes: vec![node.clone()],
                connections: vec![],
                active: false,
            }),
            workflow_data: Arc::new(WorkflowData::default()),
            descriptor: WebhookDescriptor {
                http_method: method,
                path: "orders".to_string(),
                webhook_id: None,
                workflow_id,
                node_name: "Webhook".to_string(),
                allowed_origins: None,
            },
            trigger_node: node,
            mode: ExecuteMode::Manual,
            session_id: Some("s1".to_string()),
            request: WebhookRequest::new(method, "orders").with_body(json!({ "id": 7 })),
        }
    }

    #[tokio::test]
    async fn test_execute_records_execution() {
        let executor = LocalExecutor::new();
        let req = request(HttpMethod::Post, json!({}));
        let workflow_id = req.workflow.id.unwrap();

        let outcome = executor.execute(req).await.unwrap();
        let execution_id = outcome.execution_id().unwrap().to_string();
        assert_eq!(outcome.response().status, 200);
        assert_eq!(outcome.response().body["executionId"], json!(execution_id));

        let record = executor.get(&execution_id).unwrap();
        assert_eq!(record.workflow_id, workflow_id);
        assert_eq!(record.payload, json!({ "id": 7 }));
        assert_eq!(record.session_id.as_deref(), Some("s1"));
        assert_eq!(executor.executions_for(workflow_id).len(), 1);
    }

    #[tokio::test]
    async fn test_head_probe_does_not_execute() {
        let executor = LocalExecutor::new();
        let outcome = executor
            .execute(request(HttpMethod::Head, json!({})))
            .await
            .unwrap();
        assert!(matches!(outcome, ExecutionOutcome::NoExecution { .. }));
        assert!(executor.is_empty());
    }

    #[tokio::test]
    async fn test_response_code_parameter() {
        let executor = LocalExecutor::new();
        let outcome = executor
            .execute(request(HttpMethod::Post, json!({ "responseCode": 202 })))
            .await
            .unwrap();
        assert_eq!(outcome.response().status, 202);

        let err = executor
            .execute(request(HttpMethod::Post, json!({ "responseCode": 42 })))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Failed(_)));
        assert_eq!(executor.len(), 1);
    }
}
