//! HTTP request handlers.

pub mod test_webhook;
pub mod webhook;
pub mod ws;
