//! Block model: the unit of data flowing through the pipeline.
//!
//! A block is one chunk read from the source stream, identified by its
//! sequence index (assigned in read order, which is the order the writer must
//! reproduce).  While a block sits in the queue a transform worker may replace
//! its payload wholesale, so the shared handle [`BlockCell`] guards the
//! mutable parts behind a mutex.

use std::mem;
use std::sync::{Arc, Mutex};

/// Processing status of a block.  Statuses only ever advance; the variant
/// order encodes the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BlockStatus {
    /// Chunk has been read from the source, not yet transformed.
    ReadDone,
    /// A worker has claimed this block for transformation.
    Processing,
    /// Transform complete; payload now holds the transformed bytes.
    Processed,
}

/// A block's owned payload and status. Obtained from a [`BlockCell`] when the
/// writer dequeues it.
#[derive(Debug)]
pub struct Block {
    pub seq: u64,
    pub data: Vec<u8>,
    pub status: BlockStatus,
}

#[derive(Debug)]
struct BlockState {
    data: Vec<u8>,
    status: BlockStatus,
}

/// Shared handle to a block that is (or was) enqueued.  The sequence index is
/// immutable and readable without locking; payload and status live behind a
/// mutex because a transform worker mutates them while the queue still holds
/// the block.
#[derive(Debug)]
pub struct BlockCell {
    seq: u64,
    state: Mutex<BlockState>,
}

impl BlockCell {
    pub fn new(seq: u64, data: Vec<u8>, status: BlockStatus) -> Arc<Self> {
        Arc::new(BlockCell {
            seq,
            state: Mutex::new(BlockState { data, status }),
        })
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn status(&self) -> BlockStatus {
        self.state.lock().unwrap().status
    }

    /// Logical length of the valid bytes currently held.
    pub fn payload_len(&self) -> usize {
        self.state.lock().unwrap().data.len()
    }

    /// Claim the block for transformation and take its payload out, leaving
    /// an empty buffer behind.  The worker transforms without holding the
    /// lock and hands the result back via [`BlockCell::complete`].
    pub fn begin_processing(&self) -> Vec<u8> {
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.status <= BlockStatus::Processing);
        state.status = BlockStatus::Processing;
        mem::take(&mut state.data)
    }

    /// Install the transformed payload and mark the block ready for writing.
    pub fn complete(&self, data: Vec<u8>) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.status <= BlockStatus::Processed);
        state.data = data;
        state.status = BlockStatus::Processed;
    }

    /// Take the block out of the cell.  Used by the queue on dequeue; the
    /// cell is dropped right after.
    pub(crate) fn take(&self) -> Block {
        let mut state = self.state.lock().unwrap();
        Block {
            seq: self.seq,
            data: mem::take(&mut state.data),
            status: state.status,
        }
    }
}
