//! In-process active-route table.
//!
//! Holds one entry per armed route, grouped by owning workflow. A route is
//! owned by a single workflow at a time: adding a route another workflow
//! already holds fails with [`RouteError::PathInUse`].

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use testhook_core::webhook::routes::ActiveRoutes;
use testhook_types::error::RouteError;
use testhook_types::webhook::{HttpMethod, RouteKey, RouteTarget, WebhookDescriptor};
use testhook_types::workflow::{ActivationMode, ExecuteMode, ExecutionContext, Workflow};

// ---------------------------------------------------------------------------
// RouteEntry
// ---------------------------------------------------------------------------

/// One registered route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub workflow_id: Uuid,
    /// Workflow name (for logging).
    pub workflow_name: String,
    pub node_name: String,
    pub mode: ExecuteMode,
    pub activation: ActivationMode,
    /// Public URL the route is reachable under.
    pub url: String,
}

// ---------------------------------------------------------------------------
// InMemoryRouteTable
// ---------------------------------------------------------------------------

/// Thread-safe route table.
///
/// Uses `DashMap` for concurrent read/write access without locking the
/// entire table.
pub struct InMemoryRouteTable {
    routes: Arc<DashMap<RouteKey, RouteEntry>>,
}

impl InMemoryRouteTable {
    pub fn new() -> Self {
        Self {
            routes: Arc::new(DashMap::new()),
        }
    }

    /// Look up the entry of a static route.
    pub fn lookup(&self, method: HttpMethod, path: &str) -> Option<RouteEntry> {
        self.routes
            .get(&RouteKey::fixed(method, path))
            .map(|r| r.value().clone())
    }

    /// Number of routes owned by `workflow_id`.
    pub fn count_for(&self, workflow_id: Uuid) -> usize {
        self.routes
            .iter()
            .filter(|r| r.value().workflow_id == workflow_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Remove every route of `workflow_id`. Returns the number removed.
    fn remove_group(&self, workflow_id: Uuid) -> usize {
        let before = self.routes.len();
        self.routes.retain(|_, entry| entry.workflow_id != workflow_id);
        before.saturating_sub(self.routes.len())
    }
}

impl Default for InMemoryRouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveRoutes for InMemoryRouteTable {
    async fn add(
        &self,
        workflow: &Workflow,
        descriptor: &WebhookDescriptor,
        context: &ExecutionContext,
        mode: ExecuteMode,
        activation: ActivationMode,
    ) -> Result<(), RouteError> {
        let key = descriptor.route_key();
        let entry = RouteEntry {
            workflow_id: descriptor.workflow_id,
            workflow_name: workflow.name.clone(),
            node_name: descriptor.node_name.clone(),
            mode,
            activation,
            url: context.test_url(&descriptor.path),
        };

        match self.routes.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let holder = occupied.get().workflow_id;
                if holder != descriptor.workflow_id {
                    let path = match &key.target {
                        RouteTarget::Static { path } => path.clone(),
                        RouteTarget::Dynamic { .. } => descriptor.path.clone(),
                    };
                    return Err(RouteError::PathInUse {
                        path,
                        workflow_id: holder,
                    });
                }
                occupied.insert(entry);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }

        tracing::debug!(
            route = %key,
            workflow_id = %descriptor.workflow_id,
            "registered route"
        );
        Ok(())
    }

    async fn remove_workflow(&self, workflow: &Workflow) -> Result<bool, RouteError> {
        let Some(workflow_id) = workflow.id else {
            return Ok(false);
        };
        let removed = self.remove_group(workflow_id);
        tracing::debug!(%workflow_id, removed, "removed route group");
        Ok(removed > 0)
    }

    async fn remove_all(&self, workflows: &[Arc<Workflow>]) -> Result<(), RouteError> {
        let removed: usize = workflows
            .iter()
            .filter_map(|w| w.id)
            .map(|id| self.remove_group(id))
            .sum();
        tracing::debug!(workflows = workflows.len(), removed, "removed route groups");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow(name: &str) -> Workflow {
        Workflow {
            id: Some(Uuid::now_v7()),
            name: name.to_string(),
            nodes: vec![],
            connections: vec![],
            active: false,
        }
    }

    fn descriptor(wf: &Workflow, method: HttpMethod, path: &str) -> WebhookDescriptor {
        WebhookDescriptor {
            http_method: method,
            path: path.to_string(),
            webhook_id: None,
            workflow_id: wf.id.unwrap(),
            node_name: "Webhook".to_string(),
            allowed_origins: None,
        }
    }

    async fn add(table: &InMemoryRouteTable, wf: &Workflow, d: &WebhookDescriptor) -> Result<(), RouteError> {
        table
            .add(
                wf,
                d,
                &ExecutionContext::default(),
                ExecuteMode::Manual,
                ActivationMode::Manual,
            )
            .await
    }

    #[tokio::test]
    async fn test_add_and_lookup() {
        let table = InMemoryRouteTable::new();
        let wf = workflow("orders");
        add(&table, &wf, &descriptor(&wf, HttpMethod::Post, "orders"))
            .await
            .unwrap();

        let entry = table.lookup(HttpMethod::Post, "/orders/").unwrap();
        assert_eq!(entry.workflow_id, wf.id.unwrap());
        assert_eq!(entry.workflow_name, "orders");
        assert!(table.lookup(HttpMethod::Get, "orders").is_none());
    }

    #[tokio::test]
    async fn test_path_held_by_other_workflow_is_rejected() {
        let table = InMemoryRouteTable::new();
        let a = workflow("a");
        let b = workflow("b");
        add(&table, &a, &descriptor(&a, HttpMethod::Get, "shared"))
            .await
            .unwrap();

        let err = add(&table, &b, &descriptor(&b, HttpMethod::Get, "shared"))
            .await
            .unwrap_err();
        match err {
            RouteError::PathInUse { path, workflow_id } => {
                assert_eq!(path, "shared");
                assert_eq!(workflow_id, a.id.unwrap());
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Same workflow may re-register its own route.
        add(&table, &a, &descriptor(&a, HttpMethod::Get, "shared"))
            .await
            .unwrap();
        // A different method is a different route.
        add(&table, &b, &descriptor(&b, HttpMethod::Post, "shared"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remove_workflow_removes_group() {
        let table = InMemoryRouteTable::new();
        let a = workflow("a");
        let b = workflow("b");
        add(&table, &a, &descriptor(&a, HttpMethod::Get, "one")).await.unwrap();
        add(&table, &a, &descriptor(&a, HttpMethod::Post, "two")).await.unwrap();
        add(&table, &b, &descriptor(&b, HttpMethod::Get, "three")).await.unwrap();
        assert_eq!(table.count_for(a.id.unwrap()), 2);

        assert!(table.remove_workflow(&a).await.unwrap());
        assert_eq!(table.count_for(a.id.unwrap()), 0);
        assert_eq!(table.len(), 1);
        assert!(!table.remove_workflow(&a).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_all() {
        let table = InMemoryRouteTable::new();
        let a = Arc::new(workflow("a"));
        let b = Arc::new(workflow("b"));
        add(&table, &a, &descriptor(&a, HttpMethod::Get, "one")).await.unwrap();
        add(&table, &b, &descriptor(&b, HttpMethod::Get, "two")).await.unwrap();

        table.remove_all(&[a, b]).await.unwrap();
        assert!(table.is_empty());
    }
}
