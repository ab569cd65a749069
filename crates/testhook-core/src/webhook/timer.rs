//! Idle-expiry timer shared by all registrations created in one arm call.
//!
//! The timer is a [`CancellationToken`] plus a sleeping task. Cancelling is a
//! pure "cancel if still pending" operation and may be called any number of
//! times from any path (dispatch, explicit cancel, rollback).

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Scheduled cancellation handle.
#[derive(Debug)]
pub struct ExpiryTimer {
    id: Uuid,
    token: CancellationToken,
}

impl ExpiryTimer {
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            token: CancellationToken::new(),
        }
    }

    /// Identifies the arm call this timer belongs to.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run `on_expire` after `ttl` unless the timer is cancelled first.
    ///
    /// Scheduling a timer that is already cancelled spawns nothing.
    pub fn schedule<F>(&self, ttl: Duration, on_expire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.token.is_cancelled() {
            return;
        }
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(ttl) => {
                    // Mark fired so a concurrent cancel is a no-op.
                    token.cancel();
                    on_expire.await;
                }
            }
        });
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for ExpiryTimer {
    fn default() -> Self {
        Self::new()
    }
}
