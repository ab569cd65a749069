//! Authoritative in-memory table of active test registrations.
//!
//! Every operation takes the lock exactly once, so each is atomic with respect
//! to the others, and none awaits anything but the lock itself. Multi-key
//! removals (`take_*`, `drain`) happen inside a single critical section so
//! concurrent readers see either all or none of a batch.
//!
//! Removals cancel the expiry timer of what they remove before releasing the
//! lock, and `insert` refuses a registration whose timer is already cancelled.
//! An arm call racing a cancel therefore cannot slip a registration in after
//! its batch was torn down.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use testhook_types::webhook::{HttpMethod, RegistrationKey, RouteKey, WebhookDescriptor};
use testhook_types::workflow::{SessionId, Workflow, WorkflowData};

use super::matcher::{find_route, RouteLookup, RouteMatch};
use super::timer::ExpiryTimer;

// ---------------------------------------------------------------------------
// TestRegistration
// ---------------------------------------------------------------------------

/// One armed test webhook.
#[derive(Debug, Clone)]
pub struct TestRegistration {
    pub key: RegistrationKey,
    pub descriptor: WebhookDescriptor,
    /// Graph snapshot taken at arm time; shared read-only with the executor.
    pub workflow: Arc<Workflow>,
    pub workflow_data: Arc<WorkflowData>,
    /// Editor session to notify, if any.
    pub session_id: Option<SessionId>,
    /// Expiry timer shared with every sibling from the same arm call.
    pub timer: Arc<ExpiryTimer>,
    claimed: bool,
}

impl TestRegistration {
    pub fn new(
        descriptor: WebhookDescriptor,
        workflow: Arc<Workflow>,
        workflow_data: Arc<WorkflowData>,
        session_id: Option<SessionId>,
        timer: Arc<ExpiryTimer>,
    ) -> Self {
        Self {
            key: descriptor.registration_key(),
            descriptor,
            workflow,
            workflow_data,
            session_id,
            timer,
            claimed: false,
        }
    }

    pub fn owner_workflow_id(&self) -> Uuid {
        self.key.workflow_id
    }

    /// Whether a dispatch currently holds this registration.
    pub fn is_claimed(&self) -> bool {
        self.claimed
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StoreState {
    registrations: HashMap<RegistrationKey, TestRegistration>,
    /// Route index, oldest registration first.
    routes: HashMap<RouteKey, Vec<RegistrationKey>>,
}

impl StoreState {
    fn remove(&mut self, key: &RegistrationKey) -> Option<TestRegistration> {
        let removed = self.registrations.remove(key)?;
        if let Some(keys) = self.routes.get_mut(&key.route) {
            keys.retain(|k| k != key);
            if keys.is_empty() {
                self.routes.remove(&key.route);
            }
        }
        Some(removed)
    }

    /// Remove every registration matching `pred` and cancel their timers.
    fn remove_where(&mut self, pred: impl Fn(&TestRegistration) -> bool) -> Vec<TestRegistration> {
        let keys: Vec<RegistrationKey> = self
            .registrations
            .values()
            .filter(|r| pred(*r))
            .map(|r| r.key.clone())
            .collect();
        let removed: Vec<TestRegistration> = keys.iter().filter_map(|k| self.remove(k)).collect();
        for registration in &removed {
            registration.timer.cancel();
        }
        removed
    }

    fn has_workflow(&self, workflow_id: Uuid) -> bool {
        self.registrations
            .keys()
            .any(|k| k.workflow_id == workflow_id)
    }
}

impl RouteLookup for StoreState {
    fn candidates(&self, key: &RouteKey) -> Vec<&WebhookDescriptor> {
        self.routes
            .get(key)
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| self.registrations.get(k))
                    .map(|r| &r.descriptor)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Result of [`TestWebhookStore::insert`].
#[derive(Debug)]
pub enum InsertOutcome {
    /// Stored. Carries the registration previously held under the same key.
    Inserted { displaced: Option<TestRegistration> },
    /// Refused: the registration's batch was torn down while it was being armed.
    TimerCancelled,
}

/// Registrations removed as one batch.
#[derive(Debug, Default)]
pub struct BatchRemoval {
    pub registrations: Vec<TestRegistration>,
    /// No registration of the owning workflow is left in the store.
    pub workflow_drained: bool,
}

/// Thread-safe table of test registrations.
#[derive(Debug, Default)]
pub struct TestWebhookStore {
    state: RwLock<StoreState>,
}

impl TestWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a registration, displacing any previous one under the same key.
    ///
    /// The displaced registration keeps its timer; its batch is still owned
    /// by whoever armed it.
    pub async fn insert(&self, registration: TestRegistration) -> InsertOutcome {
        let mut state = self.state.write().await;
        if registration.timer.is_cancelled() {
            return InsertOutcome::TimerCancelled;
        }
        let key = registration.key.clone();
        let displaced = state.remove(&key);
        state.routes.entry(key.route.clone()).or_default().push(key.clone());
        state.registrations.insert(key, registration);
        InsertOutcome::Inserted { displaced }
    }

    pub async fn get(&self, key: &RegistrationKey) -> Option<TestRegistration> {
        self.state.read().await.registrations.get(key).cloned()
    }

    /// Remove a registration. Returns `true` iff something was removed.
    pub async fn delete(&self, key: &RegistrationKey) -> bool {
        self.state.write().await.remove(key).is_some()
    }

    pub async fn keys_for_workflow(&self, workflow_id: Uuid) -> HashSet<RegistrationKey> {
        self.state
            .read()
            .await
            .registrations
            .keys()
            .filter(|k| k.workflow_id == workflow_id)
            .cloned()
            .collect()
    }

    /// Distinct workflows that currently have at least one registration.
    pub async fn all_workflows(&self) -> Vec<Arc<Workflow>> {
        let state = self.state.read().await;
        distinct_workflows(state.registrations.values())
    }

    /// Atomically remove every registration owned by `workflow_id`.
    pub async fn take_workflow(&self, workflow_id: Uuid) -> Vec<TestRegistration> {
        self.state
            .write()
            .await
            .remove_where(|r| r.owner_workflow_id() == workflow_id)
    }

    /// Atomically remove the registrations of `workflow_id` armed under `timer`.
    pub async fn take_batch(&self, workflow_id: Uuid, timer: Uuid) -> BatchRemoval {
        let mut state = self.state.write().await;
        let registrations = state
            .remove_where(|r| r.owner_workflow_id() == workflow_id && r.timer.id() == timer);
        BatchRemoval {
            registrations,
            workflow_drained: !state.has_workflow(workflow_id),
        }
    }

    /// Atomically remove registrations of `workflow_id` armed under a timer
    /// other than `current_timer`.
    pub async fn take_superseded(
        &self,
        workflow_id: Uuid,
        current_timer: Uuid,
    ) -> Vec<TestRegistration> {
        self.state.write().await.remove_where(|r| {
            r.owner_workflow_id() == workflow_id && r.timer.id() != current_timer
        })
    }

    /// Atomically remove everything.
    pub async fn drain(&self) -> Vec<TestRegistration> {
        let mut state = self.state.write().await;
        state.routes.clear();
        let drained: Vec<TestRegistration> = state.registrations.drain().map(|(_, r)| r).collect();
        for registration in &drained {
            registration.timer.cancel();
        }
        drained
    }

    /// Mark a registration as held by a dispatch and return it.
    ///
    /// Returns `None` if it is absent or already claimed.
    pub async fn claim(&self, key: &RegistrationKey) -> Option<TestRegistration> {
        let mut state = self.state.write().await;
        let registration = state.registrations.get_mut(key)?;
        if registration.claimed {
            return None;
        }
        registration.claimed = true;
        Some(registration.clone())
    }

    /// Give a claimed registration back without consuming it.
    ///
    /// Only the registration armed under `timer` is released; a newer one
    /// that displaced it under the same key is left alone.
    pub async fn release(&self, key: &RegistrationKey, timer: Uuid) -> bool {
        let mut state = self.state.write().await;
        match state.registrations.get_mut(key) {
            Some(registration) if registration.timer.id() == timer => {
                registration.claimed = false;
                true
            }
            _ => false,
        }
    }

    /// Run the matcher against the current table.
    pub async fn find_route(&self, method: HttpMethod, path: &str) -> Option<RouteMatch> {
        let state = self.state.read().await;
        find_route(&*state, method, path)
    }

    /// Methods with a registration matching `path`.
    pub async fn methods_for(&self, path: &str) -> Vec<HttpMethod> {
        let state = self.state.read().await;
        HttpMethod::ALL
            .into_iter()
            .filter(|m| find_route(&*state, *m, path).is_some())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.registrations.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.registrations.is_empty()
    }
}

/// Distinct workflows referenced by `registrations`, first occurrence kept.
pub fn distinct_workflows<'a>(
    registrations: impl IntoIterator<Item = &'a TestRegistration>,
) -> Vec<Arc<Workflow>> {
    let mut seen = HashSet::new();
    registrations
        .into_iter()
        .filter(|r| seen.insert(r.owner_workflow_id()))
        .map(|r| Arc::clone(&r.workflow))
        .collect()
}
