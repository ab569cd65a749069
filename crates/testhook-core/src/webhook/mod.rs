//! Test-webhook registry.
//!
//! - `matcher` -- pure (method, path) -> descriptor matching with parameter extraction
//! - `store` -- the in-memory table of active test registrations
//! - `timer` -- cancellable idle-expiry timer shared by one arm call
//! - `source` -- which webhooks a workflow exposes
//! - `routes` -- port to the active-route table
//! - `executor` -- port to the workflow executor
//! - `registry` -- arm / dispatch / cancel / remove-all orchestration

pub mod executor;
pub mod matcher;
pub mod registry;
pub mod routes;
pub mod source;
pub mod store;
pub mod timer;

pub use registry::{ArmRequest, ArmedWorkflow, TestWebhooks};
