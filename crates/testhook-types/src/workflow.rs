//! Workflow snapshot types handed to the registry when a workflow is armed.
//!
//! The registry never interprets the graph beyond locating nodes by name and
//! walking connections upstream; everything else is carried through to the
//! executor untouched.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies an editor's live push connection.
pub type SessionId = String;

// ---------------------------------------------------------------------------
// Workflow graph
// ---------------------------------------------------------------------------

/// A workflow graph as seen by the test-webhook registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// `None` until the workflow has been saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub connections: Vec<NodeConnection>,
    #[serde(default)]
    pub active: bool,
}

/// One node of a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Unique within a workflow.
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub parameters: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
}

/// A directed edge `from -> to` between two nodes, by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConnection {
    pub from: String,
    pub to: String,
}

impl Workflow {
    /// Look up a node by name.
    pub fn node(&self, name: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Names of `node` and every node upstream of it.
    pub fn upstream_of(&self, node: &str) -> HashSet<String> {
        let mut parents: HashMap<&str, Vec<&str>> = HashMap::new();
        for conn in &self.connections {
            parents.entry(conn.to.as_str()).or_default().push(conn.from.as_str());
        }

        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([node]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.to_string()) {
                continue;
            }
            if let Some(ps) = parents.get(current) {
                queue.extend(ps.iter().copied());
            }
        }
        seen
    }
}

/// Persisted metadata of a workflow, passed through to the executor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub settings: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_data: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Execution parameters
// ---------------------------------------------------------------------------

/// Why a workflow is being executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMode {
    #[default]
    Manual,
    Trigger,
    Webhook,
    Internal,
}

/// Why webhooks are being activated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    Init,
    Create,
    Update,
    Activate,
    #[default]
    Manual,
}

/// Ambient data about the arming call, forwarded to collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Base URL test webhooks are reachable under (e.g. `http://host/webhook-test`).
    #[serde(default)]
    pub webhook_test_base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ExecutionContext {
    /// Full URL a descriptor path is served under.
    pub fn test_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.webhook_test_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
