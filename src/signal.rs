//! Shared termination signals: the single-assignment error slot and the
//! cooperative cancellation token.
//!
//! Both are observed by the reader and writer on every loop iteration.  The
//! error slot retains only the *first* failure so that the cascade of
//! secondary errors produced while the pipeline unwinds never replaces the
//! root cause; losers are demoted to log lines.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::error::PipelineError;
use crate::queue::BlockQueue;

/// Single-assignment slot for the pipeline's terminal failure.
#[derive(Debug, Default)]
pub struct ErrorSlot {
    set: AtomicBool,
    slot: Mutex<Option<PipelineError>>,
}

impl ErrorSlot {
    pub fn new() -> Self {
        ErrorSlot::default()
    }

    /// Record a failure. Returns `true` if this was the first one; later
    /// failures are logged and discarded.
    pub fn record(&self, err: PipelineError) -> bool {
        let mut slot = self.slot.lock().unwrap();
        if slot.is_some() {
            warn!("secondary failure discarded: {err}");
            return false;
        }
        *slot = Some(err);
        self.set.store(true, Ordering::Release);
        true
    }

    /// Cheap check used inside role loops.
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    pub fn take(&self) -> Option<PipelineError> {
        self.slot.lock().unwrap().take()
    }
}

#[derive(Debug, Default)]
struct CancelInner {
    flag: AtomicBool,
    // Registered by the coordinator so cancel() can wake condvar waiters
    // instead of relying on timed waits.
    queue: Mutex<Option<Arc<BlockQueue>>>,
}

/// Cloneable cooperative cancellation token.
///
/// Cancellation is non-preemptive: in-flight transforms finish, the reader
/// and writer exit at their next loop iteration, and the run reports a
/// `Canceled` terminal status rather than an error.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::Release);
        if let Some(queue) = self.inner.queue.lock().unwrap().as_ref() {
            queue.interrupt();
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// Wire the running pipeline's queue into the token.  If the token was
    /// canceled before the run started, the queue is interrupted right away.
    pub(crate) fn attach(&self, queue: Arc<BlockQueue>) {
        let already = self.is_canceled();
        *self.inner.queue.lock().unwrap() = Some(Arc::clone(&queue));
        if already {
            queue.interrupt();
        }
    }

    /// Detach the queue when the run ends so a stale token cannot keep the
    /// queue alive.
    pub(crate) fn detach(&self) {
        self.inner.queue.lock().unwrap().take();
    }
}
