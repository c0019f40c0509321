//! Shutdown signalling for trigger workers.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// An idempotent shutdown signal shared between a trigger and its workers.
///
/// Signalling is idempotent - only the first reason is kept. Workers can
/// await the signal alongside their input queues.
#[derive(Clone, Default)]
pub struct ShutdownToken {
    inner: Arc<Inner>,
}

struct Inner {
    tx: watch::Sender<bool>,
    reason: RwLock<Option<String>>,
}

impl Default for Inner {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            tx,
            reason: RwLock::new(None),
        }
    }
}

impl ShutdownToken {
    /// Creates a new token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals shutdown with a reason. The first reason wins.
    pub fn shutdown(&self, reason: impl Into<String>) {
        let mut guard = self.inner.reason.write();
        if guard.is_none() {
            *guard = Some(reason.into());
            let _ = self.inner.tx.send(true);
        }
    }

    /// Returns whether shutdown has been signalled.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.inner.tx.borrow()
    }

    /// Returns the shutdown reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.read().clone()
    }

    /// Waits until shutdown is signalled.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl fmt::Debug for ShutdownToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownToken")
            .field("shutdown", &self.is_shutdown())
            .field("reason", &self.reason())
            .finish()
    }
}
