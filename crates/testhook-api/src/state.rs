//! Application state wiring the registry to its collaborators.
//!
//! The registry is generic over the route table and executor; AppState pins
//! it to the concrete infra implementations.

use std::sync::Arc;

use testhook_core::event::PushBus;
use testhook_core::webhook::TestWebhooks;
use testhook_infra::workflow::executor::LocalExecutor;
use testhook_infra::workflow::route_table::InMemoryRouteTable;
use testhook_types::config::GlobalConfig;
use testhook_types::workflow::ExecutionContext;

/// Concrete registry type pinned to infra implementations.
pub type ConcreteTestWebhooks = TestWebhooks<InMemoryRouteTable, LocalExecutor>;

/// Shared application state used by the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub test_webhooks: Arc<ConcreteTestWebhooks>,
    pub push_bus: PushBus,
    pub config: Arc<GlobalConfig>,
}

impl AppState {
    /// Wire the registry, route table, executor and push bus.
    pub fn new(config: GlobalConfig) -> Self {
        let push_bus = PushBus::new(config.registry.push_capacity);
        let test_webhooks = Arc::new(TestWebhooks::new(
            InMemoryRouteTable::new(),
            LocalExecutor::new(),
            Arc::new(push_bus.clone()),
            &config.registry,
        ));

        tracing::debug!(
            timeout_ms = config.registry.test_webhook_timeout_ms,
            prefix = %config.server.test_path_prefix,
            "application state initialized"
        );

        Self {
            test_webhooks,
            push_bus,
            config: Arc::new(config),
        }
    }

    /// Context handed to the route table when arming.
    pub fn execution_context(&self, user_id: Option<String>) -> ExecutionContext {
        ExecutionContext {
            webhook_test_base_url: self.config.server.webhook_test_base_url(),
            user_id,
        }
    }
}
