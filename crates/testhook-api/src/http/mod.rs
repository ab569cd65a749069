//! HTTP surface for testhook.
//!
//! Axum-based: test webhooks under the configured prefix, the management
//! API at `/api/v1/` with envelope responses, and a WebSocket push channel.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
