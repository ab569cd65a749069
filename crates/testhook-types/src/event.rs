//! Push events delivered to a connected editor session.
//!
//! Events are serialized with a kebab-case `type` tag:
//! `{"type":"webhook-received","workflow_id":"...","execution_id":"..."}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::SessionId;

/// Notification about a test webhook, addressed to one editor session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PushEvent {
    /// A test webhook was called and an execution started.
    WebhookReceived {
        workflow_id: Uuid,
        execution_id: String,
    },
    /// A test webhook was removed without being called.
    WebhookDeleted { workflow_id: Uuid },
}

impl PushEvent {
    pub fn workflow_id(&self) -> Uuid {
        match self {
            PushEvent::WebhookReceived { workflow_id, .. }
            | PushEvent::WebhookDeleted { workflow_id } => *workflow_id,
        }
    }
}

/// A push event together with the session it is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_id: SessionId,
    pub event: PushEvent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_webhook_received_wire_format() {
        let wf = Uuid::now_v7();
        let event = PushEvent::WebhookReceived {
            workflow_id: wf,
            execution_id: "42".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], json!("webhook-received"));
        assert_eq!(value["workflow_id"], json!(wf.to_string()));
        assert_eq!(value["execution_id"], json!("42"));
    }

    #[test]
    fn test_webhook_deleted_wire_format() {
        let wf = Uuid::now_v7();
        let value = serde_json::to_value(PushEvent::WebhookDeleted { workflow_id: wf }).unwrap();
        assert_eq!(value["type"], json!("webhook-deleted"));
        assert_eq!(event_workflow(&value), wf);
    }

    fn event_workflow(value: &serde_json::Value) -> Uuid {
        let event: PushEvent = serde_json::from_value(value.clone()).unwrap();
        event.workflow_id()
    }
}
