//! Which webhooks a workflow exposes when it is armed for testing.

use serde_json::Value;

use testhook_types::webhook::{trim_slashes, HttpMethod, WebhookDescription, PATH_PARAM_MARKER};
use testhook_types::workflow::{ExecutionContext, Workflow, WorkflowNode};

/// Node type that exposes a webhook trigger.
pub const WEBHOOK_NODE_TYPE: &str = "webhook";

/// Computes the webhook descriptions a workflow exposes.
pub trait WebhookSource: Send + Sync {
    /// Descriptions for `workflow`, restricted to webhooks feeding
    /// `target_node` when one is given.
    fn webhooks_for(
        &self,
        workflow: &Workflow,
        context: &ExecutionContext,
        target_node: Option<&str>,
    ) -> Vec<WebhookDescription>;
}

/// Derives webhooks from enabled `webhook` nodes and their parameters:
///
/// ```json
/// { "httpMethod": "POST", "path": "orders/:id", "options": { "allowedOrigins": "*" } }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeWebhookSource;

impl WebhookSource for NodeWebhookSource {
    fn webhooks_for(
        &self,
        workflow: &Workflow,
        _context: &ExecutionContext,
        target_node: Option<&str>,
    ) -> Vec<WebhookDescription> {
        let upstream = target_node.map(|t| workflow.upstream_of(t));

        workflow
            .nodes
            .iter()
            .filter(|n| !n.disabled && n.node_type == WEBHOOK_NODE_TYPE)
            .filter(|n| upstream.as_ref().is_none_or(|up| up.contains(&n.name)))
            .filter_map(describe_node)
            .collect()
    }
}

fn describe_node(node: &WorkflowNode) -> Option<WebhookDescription> {
    let params = &node.parameters;

    let http_method = match params.get("httpMethod").and_then(Value::as_str) {
        Some(m) => match m.parse::<HttpMethod>() {
            Ok(method) => method,
            Err(err) => {
                tracing::warn!(node = %node.name, %err, "skipping webhook node");
                return None;
            }
        },
        None => HttpMethod::Get,
    };

    let raw_path = params.get("path").and_then(Value::as_str).unwrap_or_default();
    let path = trim_slashes(raw_path);
    let is_dynamic = path
        .split('/')
        .any(|segment| segment.starts_with(PATH_PARAM_MARKER));

    let (path, webhook_id) = match (&node.webhook_id, path.is_empty()) {
        (Some(id), true) => (id.clone(), None),
        (None, true) => {
            tracing::warn!(node = %node.name, "webhook node has neither path nor webhook id");
            return None;
        }
        (id, false) => (
            path.to_string(),
            if is_dynamic { id.clone() } else { None },
        ),
    };

    let allowed_origins = params
        .get("options")
        .and_then(|o| o.get("allowedOrigins"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(WebhookDescription {
        http_method,
        path,
        webhook_id,
        node_name: node.name.clone(),
        allowed_origins,
    })
}
