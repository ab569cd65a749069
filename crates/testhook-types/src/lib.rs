//! Shared domain types for testhook.
//!
//! This crate contains the values passed between the registry core, the
//! infrastructure adapters and the HTTP layer: webhook descriptors and keys,
//! workflow snapshots, push events, configuration and error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod webhook;
pub mod workflow;
