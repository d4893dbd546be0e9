//! Bounded ordered queue: the only structure shared by all three roles.
//!
//! Blocks sit in the FIFO in read order while transform workers mutate them
//! in place through their [`BlockCell`] handles.  Only the head may leave the
//! queue, and only once its status equals the configured ready-for-writing
//! status — this single rule is what makes the output byte order equal the
//! input read order no matter how workers interleave.
//!
//! Two condition variables back the two wake-up predicates: "the queue may
//! accept more data" throttles the reader, "the head may be ready" wakes the
//! writer.  `interrupt()` wakes everything for error or cancellation.
//!
//! Backpressure is two-tier: the hard cap (`overfull_factor * workers`
//! blocks) is a plain counter check, while the memory tier only polls
//! `sysinfo` once depth exceeds the worker count, so a healthy pipeline never
//! pays for memory sampling.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use tracing::trace;

use crate::block::{Block, BlockCell, BlockStatus};
use crate::memory::MemoryProbe;

/// Default multiple of the worker count at which the queue refuses new
/// blocks outright.
pub const DEFAULT_OVERFULL_FACTOR: usize = 4;

/// Default memory pressure (used/total) above which the soft tier engages.
pub const DEFAULT_PRESSURE_THRESHOLD: f64 = 0.9;

/// Construction parameters for [`BlockQueue`].
#[derive(Debug)]
pub struct QueueConfig {
    /// Worker-pool size the capacity tiers are scaled by.
    pub workers: usize,
    /// Hard cap: depth above `overfull_factor * workers` is always overfull.
    pub overfull_factor: usize,
    /// Soft cap: depth above `workers` is overfull when memory pressure
    /// exceeds this threshold.
    pub pressure_threshold: f64,
    /// Status that authorizes the writer to dequeue a block. Per-mode: copy
    /// uses `ReadDone`, transform modes use `Processed`.
    pub ready_status: BlockStatus,
}

/// Outcome of waiting for enqueue capacity.
#[derive(Debug, PartialEq, Eq)]
pub enum SpaceWait {
    Available,
    Interrupted,
}

/// Outcome of waiting for the head of the queue.
#[derive(Debug, PartialEq, Eq)]
pub enum HeadEvent {
    /// The head looked ready when we woke; `try_dequeue` should be attempted.
    Ready,
    /// The reader sealed the queue and everything has been written.
    Drained,
    Interrupted,
}

#[derive(Debug)]
struct QueueInner {
    fifo: VecDeque<Entry>,
    buffered_bytes: u64,
    sealed: bool,
    interrupted: bool,
}

#[derive(Debug)]
struct Entry {
    cell: Arc<BlockCell>,
    /// Bytes charged against `buffered_bytes` at enqueue time. A transform
    /// may replace the payload, so the charge is remembered rather than
    /// re-derived on dequeue.
    charged: u64,
}

#[derive(Debug)]
pub struct BlockQueue {
    inner: Mutex<QueueInner>,
    space_available: Condvar,
    head_ready: Condvar,
    probe: Mutex<MemoryProbe>,
    workers: usize,
    overfull_factor: usize,
    pressure_threshold: f64,
    ready_status: BlockStatus,
}

impl BlockQueue {
    pub fn new(config: QueueConfig, probe: MemoryProbe) -> Arc<Self> {
        Arc::new(BlockQueue {
            inner: Mutex::new(QueueInner {
                fifo: VecDeque::new(),
                buffered_bytes: 0,
                sealed: false,
                interrupted: false,
            }),
            space_available: Condvar::new(),
            head_ready: Condvar::new(),
            probe: Mutex::new(probe),
            workers: config.workers.max(1),
            overfull_factor: config.overfull_factor.max(1),
            pressure_threshold: config.pressure_threshold,
            ready_status: config.ready_status,
        })
    }

    /// Append a block in read order. If the queue was empty the new block is
    /// the head and could already satisfy the ready predicate, so the writer
    /// is woken.
    pub fn enqueue(&self, cell: Arc<BlockCell>) {
        let mut inner = self.inner.lock().unwrap();
        let was_empty = inner.fifo.is_empty();
        let charged = cell.payload_len() as u64;
        inner.buffered_bytes += charged;
        inner.fifo.push_back(Entry { cell, charged });
        trace!(depth = inner.fifo.len(), bytes = inner.buffered_bytes, "enqueue");
        if was_empty {
            self.head_ready.notify_all();
        }
    }

    /// Remove and return the head block, but only if its status equals the
    /// ready-for-writing status. Returns `None` without mutating the queue
    /// otherwise.
    pub fn try_dequeue(&self) -> Option<Block> {
        let mut inner = self.inner.lock().unwrap();
        let ready = match inner.fifo.front() {
            Some(entry) => entry.cell.status() == self.ready_status,
            None => false,
        };
        if !ready {
            return None;
        }
        let entry = inner.fifo.pop_front().unwrap();
        inner.buffered_bytes -= entry.charged;
        trace!(depth = inner.fifo.len(), "dequeue");
        // Capacity was freed; the new head may or may not be ready, the
        // writer re-checks on its next wait.
        self.space_available.notify_all();
        self.head_ready.notify_all();
        Some(entry.cell.take())
    }

    /// Block until the queue can accept another block, or until interrupted.
    pub fn wait_for_space(&self) -> SpaceWait {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.interrupted {
                return SpaceWait::Interrupted;
            }
            if !self.is_overfull_locked(&inner) {
                return SpaceWait::Available;
            }
            inner = self.space_available.wait(inner).unwrap();
        }
    }

    /// Block until the head might be ready, the queue has drained after
    /// sealing, or an interrupt fired.
    pub fn wait_for_head(&self) -> HeadEvent {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.interrupted {
                return HeadEvent::Interrupted;
            }
            match inner.fifo.front() {
                Some(entry) if entry.cell.status() == self.ready_status => {
                    return HeadEvent::Ready;
                }
                None if inner.sealed => return HeadEvent::Drained,
                _ => {}
            }
            inner = self.head_ready.wait(inner).unwrap();
        }
    }

    /// Called by a transform worker after advancing a block to the ready
    /// status. Wakes the writer if that block is at the head.
    pub fn block_ready(&self, seq: u64) {
        let inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.fifo.front() {
            if entry.cell.seq() == seq {
                self.head_ready.notify_all();
            }
        }
    }

    /// Mark end of input: the reader will enqueue nothing more, so once the
    /// FIFO drains the writer terminates normally.
    pub fn seal(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.sealed = true;
        self.head_ready.notify_all();
    }

    /// Wake every waiter for error or cancellation. Sticky.
    pub fn interrupt(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.interrupted = true;
        self.space_available.notify_all();
        self.head_ready.notify_all();
    }

    pub fn depth(&self) -> usize {
        self.inner.lock().unwrap().fifo.len()
    }

    pub fn buffered_bytes(&self) -> u64 {
        self.inner.lock().unwrap().buffered_bytes
    }

    /// Two-tier overfull check. The hard tier is a counter comparison; the
    /// soft tier polls memory pressure only once depth exceeds the worker
    /// count.
    fn is_overfull_locked(&self, inner: &QueueInner) -> bool {
        let depth = inner.fifo.len();
        if depth > self.overfull_factor * self.workers {
            return true;
        }
        if depth > self.workers {
            let pressure = self.probe.lock().unwrap().pressure();
            return pressure > self.pressure_threshold;
        }
        false
    }
}
