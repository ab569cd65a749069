//! Test-webhook registry: arm, dispatch, cancel and shutdown.
//!
//! `TestWebhooks` is constructed once at process start and shared as an
//! `Arc`. Arming inserts one registration per exposed webhook and starts a
//! single idle timer for the batch; a dispatch claims the matched registration,
//! runs the executor outside the store lock, then tears the workflow down.
//!
//! Dispatch cleanup, expiry and rollback are scoped to the batch created by
//! one arm call; cancel and shutdown take every batch. Whoever removes the
//! last registrations of a workflow from the store also removes its route
//! group, the others find nothing and do nothing.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::FutureExt;
use uuid::Uuid;

use testhook_types::config::RegistryConfig;
use testhook_types::error::{ExecutorError, WebhookError};
use testhook_types::event::PushEvent;
use testhook_types::webhook::{HttpMethod, RegistrationKey, WebhookDescriptor, WebhookRequest};
use testhook_types::workflow::{
    ActivationMode, ExecuteMode, ExecutionContext, SessionId, Workflow, WorkflowData, WorkflowNode,
};

use crate::event::PushChannel;

use super::executor::{ExecutionOutcome, ExecutionRequest, WebhookExecutor};
use super::routes::ActiveRoutes;
use super::source::{NodeWebhookSource, WebhookSource};
use super::store::{InsertOutcome, TestRegistration, TestWebhookStore};
use super::timer::ExpiryTimer;

// ---------------------------------------------------------------------------
// ArmRequest
// ---------------------------------------------------------------------------

/// Parameters of one arm call.
#[derive(Debug, Clone)]
pub struct ArmRequest {
    pub workflow: Arc<Workflow>,
    pub workflow_data: Arc<WorkflowData>,
    pub context: ExecutionContext,
    pub mode: ExecuteMode,
    pub activation: ActivationMode,
    pub session_id: Option<SessionId>,
    pub target_node: Option<String>,
}

impl ArmRequest {
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow: Arc::new(workflow),
            workflow_data: Arc::new(WorkflowData::default()),
            context: ExecutionContext::default(),
            mode: ExecuteMode::Manual,
            activation: ActivationMode::Manual,
            session_id: None,
            target_node: None,
        }
    }

    pub fn with_workflow_data(mut self, data: WorkflowData) -> Self {
        self.workflow_data = Arc::new(data);
        self
    }

    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_modes(mut self, mode: ExecuteMode, activation: ActivationMode) -> Self {
        self.mode = mode;
        self.activation = activation;
        self
    }

    pub fn with_session(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_target_node(mut self, node: impl Into<String>) -> Self {
        self.target_node = Some(node.into());
        self
    }
}

/// A workflow currently waiting for a test call.
#[derive(Debug, Clone)]
pub struct ArmedWorkflow {
    pub workflow_id: Uuid,
    pub name: String,
    pub keys: HashSet<RegistrationKey>,
}

// ---------------------------------------------------------------------------
// TestWebhooks
// ---------------------------------------------------------------------------

/// Registry of test webhooks.
pub struct TestWebhooks<R: ActiveRoutes, E: WebhookExecutor> {
    store: TestWebhookStore,
    routes: R,
    executor: E,
    push: Arc<dyn PushChannel>,
    source: Arc<dyn WebhookSource>,
    timeout: Duration,
}

impl<R, E> TestWebhooks<R, E>
where
    R: ActiveRoutes + 'static,
    E: WebhookExecutor + 'static,
{
    pub fn new(routes: R, executor: E, push: Arc<dyn PushChannel>, config: &RegistryConfig) -> Self {
        Self {
            store: TestWebhookStore::new(),
            routes,
            executor,
            push,
            source: Arc::new(NodeWebhookSource),
            timeout: config.test_webhook_timeout(),
        }
    }

    /// Replace the default node-based webhook source.
    pub fn with_source(mut self, source: Arc<dyn WebhookSource>) -> Self {
        self.source = source;
        self
    }

    pub fn store(&self) -> &TestWebhookStore {
        &self.store
    }

    pub fn routes(&self) -> &R {
        &self.routes
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // -----------------------------------------------------------------------
    // Arm
    // -----------------------------------------------------------------------

    /// Register the test webhooks of a workflow and start waiting for a call.
    ///
    /// Returns `Ok(false)` when the workflow exposes no webhook (the caller
    /// should execute immediately instead), `Ok(true)` when the caller should
    /// wait for a webhook call. A failed route registration rolls back the
    /// registrations of this call and is returned as `Registration`. If the
    /// workflow is canceled while the call is still registering routes, the
    /// partial batch is abandoned with `ArmInterrupted`.
    pub async fn arm(self: &Arc<Self>, request: ArmRequest) -> Result<bool, WebhookError> {
        let ArmRequest {
            workflow,
            workflow_data,
            context,
            mode,
            activation,
            session_id,
            target_node,
        } = request;

        let descriptions = self
            .source
            .webhooks_for(&workflow, &context, target_node.as_deref());
        if descriptions.is_empty() {
            tracing::debug!(workflow = %workflow.name, "workflow exposes no test webhooks");
            return Ok(false);
        }

        let workflow_id = workflow.id.ok_or(WebhookError::WorkflowNotSaved)?;
        let timer = Arc::new(ExpiryTimer::new());

        for description in descriptions {
            let descriptor = WebhookDescriptor::bind(description, workflow_id);
            let registration = TestRegistration::new(
                descriptor.clone(),
                Arc::clone(&workflow),
                Arc::clone(&workflow_data),
                session_id.clone(),
                Arc::clone(&timer),
            );
            let key = registration.key.clone();
            match self.store.insert(registration).await {
                InsertOutcome::Inserted { displaced: Some(_) } => {
                    tracing::debug!(%workflow_id, %key, "replaced earlier test registration");
                }
                InsertOutcome::Inserted { displaced: None } => {}
                InsertOutcome::TimerCancelled => {
                    return Err(self.interrupted(&workflow, workflow_id, &timer).await);
                }
            }

            if let Err(err) = self
                .routes
                .add(&workflow, &descriptor, &context, mode, activation)
                .await
            {
                tracing::warn!(
                    %workflow_id,
                    %key,
                    error = %err,
                    "test webhook registration failed, rolling back"
                );
                self.release_batch(&workflow, workflow_id, &timer).await;
                return Err(WebhookError::Registration(err));
            }

            tracing::debug!(%workflow_id, %key, url = %context.test_url(&descriptor.path), "test webhook armed");
        }

        if timer.is_cancelled() {
            return Err(self.interrupted(&workflow, workflow_id, &timer).await);
        }

        let superseded = self.store.take_superseded(workflow_id, timer.id()).await;
        if !superseded.is_empty() {
            tracing::debug!(%workflow_id, count = superseded.len(), "dropped registrations of an earlier arm");
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let timer_id = timer.id();
        timer.schedule(self.timeout, async move {
            if let Some(registry) = weak.upgrade() {
                registry.expire(workflow_id, timer_id).await;
            }
        });

        tracing::info!(
            %workflow_id,
            workflow = %workflow.name,
            timeout_secs = self.timeout.as_secs(),
            "waiting for test webhook call"
        );
        Ok(true)
    }

    /// Undo the registrations of one arm call.
    ///
    /// The route group is removed only when no other batch of the workflow
    /// is still armed. Route removal is idempotent, so repeating it after a
    /// concurrent cancel also clears any route this call re-added.
    async fn release_batch(&self, workflow: &Workflow, workflow_id: Uuid, timer: &ExpiryTimer) {
        timer.cancel();
        let removal = self.store.take_batch(workflow_id, timer.id()).await;
        if removal.workflow_drained {
            self.remove_route_group(workflow, workflow_id).await;
        }
    }

    async fn interrupted(
        &self,
        workflow: &Workflow,
        workflow_id: Uuid,
        timer: &ExpiryTimer,
    ) -> WebhookError {
        tracing::warn!(%workflow_id, "test webhooks removed while arming, abandoning arm");
        self.release_batch(workflow, workflow_id, timer).await;
        WebhookError::ArmInterrupted { workflow_id }
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Handle one incoming call to a test webhook.
    ///
    /// A `NoExecution` outcome leaves the registration armed. Any other
    /// outcome, including an executor error, consumes it: the workflow's
    /// registrations and route group are removed exactly once.
    pub async fn dispatch(
        self: &Arc<Self>,
        mut request: WebhookRequest,
    ) -> Result<ExecutionOutcome, WebhookError> {
        request.params.clear();
        let method = request.method;

        let route = self
            .store
            .find_route(method, &request.path)
            .await
            .ok_or_else(|| WebhookError::not_registered(method, &request.path))?;

        let key = route.descriptor.registration_key();
        let registration = self
            .store
            .claim(&key)
            .await
            .ok_or_else(|| WebhookError::not_registered(method, &request.path))?;

        let Some(trigger_node) = registration
            .workflow
            .node(&registration.descriptor.node_name)
            .cloned()
        else {
            tracing::error!(
                %key,
                node = %registration.descriptor.node_name,
                "registered trigger node missing from workflow snapshot"
            );
            self.finish(&registration).await;
            return Err(WebhookError::TriggerNodeMissing {
                workflow_id: registration.owner_workflow_id(),
                node: registration.descriptor.node_name.clone(),
            });
        };

        request.params = route.params;

        // Run in its own task so cleanup completes even if the caller goes away.
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            registry
                .run_claimed(registration, trigger_node, request)
                .await
        })
        .await
        .map_err(|err| WebhookError::Executor(ExecutorError::Aborted(err.to_string())))?
    }

    async fn run_claimed(
        &self,
        registration: TestRegistration,
        trigger_node: WorkflowNode,
        request: WebhookRequest,
    ) -> Result<ExecutionOutcome, WebhookError> {
        let key = registration.key.clone();
        let execution = ExecutionRequest {
            workflow: Arc::clone(&registration.workflow),
            workflow_data: Arc::clone(&registration.workflow_data),
            descriptor: registration.descriptor.clone(),
            trigger_node,
            mode: ExecuteMode::Manual,
            session_id: registration.session_id.clone(),
            request,
        };

        let result = AssertUnwindSafe(self.executor.execute(execution))
            .catch_unwind()
            .await
            .unwrap_or(Err(ExecutorError::Panicked));

        match result {
            Ok(ExecutionOutcome::NoExecution { response }) => {
                tracing::debug!(%key, "call did not start an execution, webhook stays armed");
                self.store.release(&key, registration.timer.id()).await;
                Ok(ExecutionOutcome::NoExecution { response })
            }
            Ok(ExecutionOutcome::Started {
                execution_id,
                response,
            }) => {
                tracing::info!(%key, %execution_id, "test webhook triggered execution");
                if let Some(session_id) = &registration.session_id {
                    self.notify(
                        session_id,
                        PushEvent::WebhookReceived {
                            workflow_id: registration.owner_workflow_id(),
                            execution_id: execution_id.clone(),
                        },
                    );
                }
                self.finish(&registration).await;
                Ok(ExecutionOutcome::Started {
                    execution_id,
                    response,
                })
            }
            Err(err) => {
                tracing::warn!(%key, error = %err, "test webhook execution failed");
                self.finish(&registration).await;
                Err(WebhookError::Executor(err))
            }
        }
    }

    /// Consume a dispatched registration and everything armed alongside it.
    ///
    /// Registrations from a later arm of the same workflow are left armed.
    async fn finish(&self, registration: &TestRegistration) {
        registration.timer.cancel();
        let workflow_id = registration.owner_workflow_id();
        let removal = self
            .store
            .take_batch(workflow_id, registration.timer.id())
            .await;
        if !removal.registrations.is_empty() && removal.workflow_drained {
            self.remove_route_group(&registration.workflow, workflow_id)
                .await;
        }
    }

    /// Timer callback: drop the batch of one arm call that was never called.
    async fn expire(&self, workflow_id: Uuid, timer_id: Uuid) {
        let removal = self.store.take_batch(workflow_id, timer_id).await;
        let Some(first) = removal.registrations.first() else {
            return;
        };
        tracing::info!(%workflow_id, "test webhooks expired without being called");

        for registration in &removal.registrations {
            if let Some(session_id) = &registration.session_id {
                self.notify(session_id, PushEvent::WebhookDeleted { workflow_id });
            }
        }
        if removal.workflow_drained {
            self.remove_route_group(&first.workflow, workflow_id).await;
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Methods a test webhook is registered for at `path`.
    pub async fn methods_for(&self, path: &str) -> Result<Vec<HttpMethod>, WebhookError> {
        let methods = self.store.methods_for(path).await;
        if methods.is_empty() {
            return Err(WebhookError::path_not_registered(path));
        }
        Ok(methods)
    }

    /// Allowed-origins setting of the webhook `method path` resolves to.
    pub async fn access_control_options(&self, method: HttpMethod, path: &str) -> Option<String> {
        self.store
            .find_route(method, path)
            .await
            .and_then(|m| m.descriptor.allowed_origins)
    }

    /// Workflows currently armed, with their registration keys.
    pub async fn armed_workflows(&self) -> Vec<ArmedWorkflow> {
        let mut armed = Vec::new();
        for workflow in self.store.all_workflows().await {
            let Some(workflow_id) = workflow.id else {
                continue;
            };
            armed.push(ArmedWorkflow {
                workflow_id,
                name: workflow.name.clone(),
                keys: self.store.keys_for_workflow(workflow_id).await,
            });
        }
        armed
    }

    // -----------------------------------------------------------------------
    // Cancel / shutdown
    // -----------------------------------------------------------------------

    /// Remove every test registration of a workflow.
    ///
    /// Returns whether anything was registered. Idempotent.
    pub async fn cancel(&self, workflow_id: Uuid) -> bool {
        let removed = self.store.take_workflow(workflow_id).await;
        let Some(first) = removed.first() else {
            return false;
        };

        for registration in &removed {
            if let Some(session_id) = &registration.session_id {
                self.notify(session_id, PushEvent::WebhookDeleted { workflow_id });
            }
        }
        self.remove_route_group(&first.workflow, workflow_id).await;

        tracing::info!(%workflow_id, removed = removed.len(), "test webhooks canceled");
        true
    }

    /// Remove every registration and route group. Used at process teardown.
    pub async fn remove_all(&self) {
        let drained = self.store.drain().await;
        if drained.is_empty() {
            return;
        }

        let workflows = super::store::distinct_workflows(&drained);
        if let Err(err) = self.routes.remove_all(&workflows).await {
            tracing::error!(error = %err, "failed to remove test webhook routes");
        }
        tracing::info!(
            workflows = workflows.len(),
            registrations = drained.len(),
            "removed all test webhooks"
        );
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn remove_route_group(&self, workflow: &Workflow, workflow_id: Uuid) {
        if let Err(err) = self.routes.remove_workflow(workflow).await {
            tracing::error!(%workflow_id, error = %err, "failed to remove test webhook routes");
        }
    }

    fn notify(&self, session_id: &str, event: PushEvent) {
        if let Err(err) = self.push.push(session_id, event) {
            tracing::warn!(session_id, error = %err, "failed to push test webhook event");
        }
    }
}
