//! Pause, resume and stop for a running crawl.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

struct Inner {
    stop: AtomicBool,
    running: Mutex<bool>,
    gate: Condvar,
}

/// Cloneable handle controlling one crawl
///
/// Stop always wins over pause: a stopped crawler never blocks on the
/// gate, and stopping a paused crawler wakes it so it can finish.
#[derive(Clone)]
pub struct CrawlControl {
    inner: Arc<Inner>,
}

impl CrawlControl {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                stop: AtomicBool::new(false),
                running: Mutex::new(true),
                gate: Condvar::new(),
            }),
        }
    }

    fn running(&self) -> MutexGuard<'_, bool> {
        self.inner.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Close the gate; the crawler blocks before its next child item
    pub fn pause(&self) {
        *self.running() = false;
    }

    /// Reopen the gate
    pub fn resume(&self) {
        *self.running() = true;
        self.inner.gate.notify_all();
    }

    /// Request a stop; irreversible for this handle
    pub fn stop(&self) {
        self.inner.stop.store(true, Ordering::SeqCst);
        // Taking the lock orders the flag before any waiter's re-check
        let _running = self.running();
        self.inner.gate.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stop.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        !*self.running()
    }

    /// Called by the crawler between items
    ///
    /// Returns `false` when the crawl must halt. Otherwise blocks while
    /// paused and returns `true` once resumed.
    pub fn checkpoint(&self) -> bool {
        if self.is_stopped() {
            return false;
        }

        let mut running = self.running();
        while !*running && !self.is_stopped() {
            running = self
                .inner
                .gate
                .wait(running)
                .unwrap_or_else(|e| e.into_inner());
        }

        !self.is_stopped()
    }
}

impl Default for CrawlControl {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CrawlControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlControl")
            .field("stopped", &self.is_stopped())
            .field("paused", &self.is_paused())
            .finish()
    }
}
