//! Session-addressed push notifications.
//!
//! `PushChannel` is the port the registry notifies editors through;
//! `PushBus` is the in-process broadcast implementation.

pub mod bus;

pub use bus::{PushBus, PushChannel};
