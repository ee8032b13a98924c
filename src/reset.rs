// ABOUTME: Reset latch that turns administrative notifications into a loop wakeup
// ABOUTME: SIGHUP is forwarded into the latch through tokio's signal self-pipe

//! Administrative reset latch.
//!
//! The wait loop awaits [`ResetLatch::notified`] next to socket readiness. A
//! [`ResetHandle`] can be cloned and handed to any producer: the SIGHUP
//! forwarder in production, tests or embedders otherwise.
//!
//! Two pieces of state back the latch:
//!
//! - a pending flag, the source of truth for "a reset was requested"
//! - a [`Notify`] permit that wakes the loop
//!
//! `notify()` sets the flag before storing the permit, so a woken loop always
//! sees the flag. A permit stored while the loop is busy makes the next wait
//! return at once, which is what keeps a notification sent just before the
//! wait from being lost. Notifications sent before the loop consumes the flag
//! collapse into one.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct LatchState {
    pending: AtomicBool,
    wakeup: Notify,
}

/// Consumer side of the reset latch, owned by the wait loop
#[derive(Debug, Default)]
pub struct ResetLatch {
    state: Arc<LatchState>,
}

/// Producer side of the reset latch
#[derive(Debug, Clone)]
pub struct ResetHandle {
    state: Arc<LatchState>,
}

impl ResetLatch {
    /// Create a latch with no pending reset
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a handle that can request resets
    pub fn handle(&self) -> ResetHandle {
        ResetHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Wait until a notification arrives (or one is already stored)
    pub async fn notified(&self) {
        self.state.wakeup.notified().await;
    }

    /// Read and clear the pending flag
    pub fn consume_pending(&self) -> bool {
        self.state.pending.swap(false, Ordering::AcqRel)
    }

    /// Whether a reset is pending, without clearing it
    pub fn is_pending(&self) -> bool {
        self.state.pending.load(Ordering::Acquire)
    }
}

impl ResetHandle {
    /// Request a reset of all active connections.
    ///
    /// Lock-free and allocation-free; safe to call from any task or thread.
    pub fn notify(&self) {
        self.state.pending.store(true, Ordering::Release);
        self.state.wakeup.notify_one();
    }
}

/// Forward every SIGHUP delivered to the process into the latch.
///
/// The signal handler is registered before this returns, so SIGHUP no longer
/// terminates the process from that point on. Must be called from within a
/// tokio runtime.
pub fn forward_hangup(handle: ResetHandle) -> io::Result<JoinHandle<()>> {
    let mut hangup = signal(SignalKind::hangup())?;
    debug!("SIGHUP handler installed");

    Ok(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("Received SIGHUP signal");
            handle.notify();
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_latch_starts_clear() {
        let latch = ResetLatch::new();
        assert!(!latch.is_pending());
        assert!(!latch.consume_pending());
    }

    #[test]
    fn test_consume_clears_flag() {
        let latch = ResetLatch::new();
        latch.handle().notify();

        assert!(latch.is_pending());
        assert!(latch.consume_pending());
        assert!(!latch.is_pending());
        assert!(!latch.consume_pending());
    }

    #[test]
    fn test_repeated_notifications_coalesce() {
        let latch = ResetLatch::new();
        let handle = latch.handle();
        handle.notify();
        handle.notify();
        handle.clone().notify();

        assert!(latch.consume_pending());
        assert!(!latch.consume_pending());
    }

    #[tokio::test]
    async fn test_notification_before_wait_is_not_lost() {
        let latch = ResetLatch::new();
        latch.handle().notify();

        timeout(Duration::from_secs(1), latch.notified())
            .await
            .expect("stored notification should wake the waiter");
        assert!(latch.consume_pending());
    }

    #[tokio::test]
    async fn test_notification_wakes_blocked_waiter() {
        let latch = ResetLatch::new();
        let handle = latch.handle();

        let notifier = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.notify();
        });

        timeout(Duration::from_secs(1), latch.notified())
            .await
            .expect("waiter should be woken");
        assert!(latch.consume_pending());
        notifier.await.unwrap();
    }

    #[tokio::test]
    async fn test_coalesced_notifications_wake_once() {
        let latch = ResetLatch::new();
        let handle = latch.handle();
        handle.notify();
        handle.notify();

        latch.notified().await;
        assert!(latch.consume_pending());

        // Only one permit is stored no matter how many notifications arrived
        let second = timeout(Duration::from_millis(50), latch.notified()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_notify_from_another_thread() {
        let latch = ResetLatch::new();
        let handle = latch.handle();

        std::thread::spawn(move || handle.notify()).join().unwrap();

        timeout(Duration::from_secs(1), latch.notified())
            .await
            .expect("cross-thread notification should wake the waiter");
        assert!(latch.consume_pending());
    }
}
