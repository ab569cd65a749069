//! Workflow infrastructure: the in-process route table and local executor.
//!
//! - `route_table` -- DashMap-backed active routes with per-workflow groups
//! - `executor` -- records webhook-triggered executions in memory

pub mod executor;
pub mod route_table;
