//! Business logic for the testhook test-webhook registry.
//!
//! This crate defines the ports (collaborator traits) that the infrastructure
//! layer implements, plus the registry itself. It depends only on
//! `testhook-types` -- never on `testhook-infra` or any server crate.

pub mod event;
pub mod webhook;
