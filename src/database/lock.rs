//! Build and rebuild locks
//!
//! [`AsyncLock`] is a plain held/not-held lock with a FIFO queue of waiters.
//! It is not reentrant. [`RebuildGate`] collapses a burst of rebuild
//! requests into as few runs as possible: while a run is in progress, any
//! number of new requests schedule exactly one more run.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct AsyncLock {
    inner: Mutex<()>,
}

/// Held until dropped
pub struct LockGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl AsyncLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock; waiters are served in arrival order
    pub async fn acquire(&self) -> LockGuard<'_> {
        LockGuard {
            _guard: self.inner.lock().await,
        }
    }

    pub fn try_acquire(&self) -> Option<LockGuard<'_>> {
        self.inner.try_lock().ok().map(|guard| LockGuard { _guard: guard })
    }

    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

#[derive(Debug, Default)]
pub struct RebuildGate {
    running: AtomicBool,
    pending: AtomicBool,
}

impl RebuildGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a rebuild
    ///
    /// Returns `false` when a run already in progress will pick the request
    /// up, `true` when this call performed the run(s) itself.
    pub async fn trigger<F, Fut>(&self, mut rebuild: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        self.pending.store(true, Ordering::SeqCst);
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        loop {
            while self.pending.swap(false, Ordering::SeqCst) {
                rebuild().await;
            }
            self.running.store(false, Ordering::SeqCst);
            // A request may have arrived between the last check and release
            if !self.pending.load(Ordering::SeqCst) || self.running.swap(true, Ordering::SeqCst) {
                return true;
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
