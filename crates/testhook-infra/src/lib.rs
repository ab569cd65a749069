//! Infrastructure layer for testhook.
//!
//! Contains implementations of the collaborator ports defined in
//! `testhook-core` (active-route table, workflow executor) and the TOML
//! configuration loader.

pub mod config;
pub mod workflow;
