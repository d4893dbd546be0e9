//! Transform worker pool.
//!
//! A fixed pool of threads (default: one per CPU) consumes block handles
//! from a bounded channel, transforms each payload in place and advances the
//! block to ready-for-writing.  Workers complete in arbitrary order; the
//! queue's head-only dequeue is what keeps the output ordered, so nothing
//! here coordinates with other workers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use tracing::error;

use crate::block::BlockCell;
use crate::error::PipelineError;
use crate::queue::BlockQueue;
use crate::signal::{CancelToken, ErrorSlot};
use crate::transform::BlockTransform;

/// Resolve a requested worker count; 0 means one per available CPU.
pub fn worker_count(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get()
    } else {
        requested
    }
}

/// Run one worker loop until the feeding channel hangs up.
pub(crate) fn run_worker(
    rx: Receiver<Arc<BlockCell>>,
    transform: &dyn BlockTransform,
    queue: &BlockQueue,
    errors: &ErrorSlot,
    cancel: &CancelToken,
) {
    for cell in rx {
        // Once the pipeline is unwinding, drain the channel without working;
        // the writer has already been interrupted and will never want these.
        if errors.is_set() || cancel.is_canceled() {
            continue;
        }

        let seq = cell.seq();
        let input = cell.begin_processing();
        let result = catch_unwind(AssertUnwindSafe(|| transform.apply(&input)));

        match result {
            Ok(Ok(output)) => {
                cell.complete(output);
                queue.block_ready(seq);
            }
            Ok(Err(source)) => {
                // A block that never reaches ready status would stall the
                // writer at this position forever, so a transform failure
                // fails the pipeline.
                error!(seq, transform = transform.name(), "transform failed: {source}");
                errors.record(PipelineError::Transform { seq, source });
                queue.interrupt();
            }
            Err(_) => {
                error!(seq, transform = transform.name(), "transform panicked");
                errors.record(PipelineError::WorkerPanic);
                queue.interrupt();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_means_all_cpus() {
        assert_eq!(worker_count(0), num_cpus::get());
        assert_eq!(worker_count(3), 3);
    }
}
