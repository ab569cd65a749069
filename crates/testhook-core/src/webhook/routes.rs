//! Port to the active-route table.
//!
//! The route table owns whatever an armed webhook needs outside this process
//! (a listener entry, a third-party subscription). The registry adds routes
//! while arming and removes a workflow's whole route group when its test
//! registrations go away.

use std::future::Future;
use std::sync::Arc;

use testhook_types::error::RouteError;
use testhook_types::webhook::WebhookDescriptor;
use testhook_types::workflow::{ActivationMode, ExecuteMode, ExecutionContext, Workflow};

/// Active-route table used by the test-webhook registry.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ActiveRoutes: Send + Sync {
    /// Register the route for one descriptor.
    fn add(
        &self,
        workflow: &Workflow,
        descriptor: &WebhookDescriptor,
        context: &ExecutionContext,
        mode: ExecuteMode,
        activation: ActivationMode,
    ) -> impl Future<Output = Result<(), RouteError>> + Send;

    /// Remove every route of `workflow`. Returns `true` if any existed.
    fn remove_workflow(
        &self,
        workflow: &Workflow,
    ) -> impl Future<Output = Result<bool, RouteError>> + Send;

    /// Remove the route groups of all `workflows` in one batch.
    fn remove_all(
        &self,
        workflows: &[Arc<Workflow>],
    ) -> impl Future<Output = Result<(), RouteError>> + Send;
}
