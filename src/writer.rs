//! Writer role: drains the queue head in strict read order.
//!
//! The writer is the only role touching the target stream.  It sleeps on the
//! queue's "head ready" condition and wakes on enqueue, dequeue, transform
//! completion or interrupt.  A scope guard flushes the target on every exit
//! path; a flush failure during unwind must not replace the primary error,
//! so the guard swallows it.

use std::io::Write;

use tracing::debug;

use crate::error::PipelineError;
use crate::queue::{BlockQueue, HeadEvent};
use crate::signal::ErrorSlot;

/// Per-run statistics the writer reports back to the coordinator.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct WriterStats {
    pub bytes_written: u64,
    pub blocks_written: u64,
}

/// Run the writer loop to completion. Failures land in the shared error
/// slot; the caller inspects it afterwards.
pub(crate) fn run_writer<W: Write>(
    target: &mut W,
    queue: &BlockQueue,
    errors: &ErrorSlot,
) -> WriterStats {
    let mut stats = WriterStats::default();
    let mut target = scopeguard::guard(target, |t| {
        let _ = t.flush();
    });

    loop {
        match queue.wait_for_head() {
            HeadEvent::Interrupted => break,
            HeadEvent::Drained => {
                debug!(
                    blocks = stats.blocks_written,
                    bytes = stats.bytes_written,
                    "queue drained"
                );
                if let Err(e) = target.flush() {
                    errors.record(PipelineError::Write(e));
                    queue.interrupt();
                }
                break;
            }
            HeadEvent::Ready => {
                // The wake-up is a hint; re-check under the queue lock. A
                // None here simply means the head moved on, so wait again.
                let Some(block) = queue.try_dequeue() else {
                    continue;
                };
                if let Err(e) = target.write_all(&block.data) {
                    errors.record(PipelineError::Write(e));
                    queue.interrupt();
                    break;
                }
                stats.bytes_written += block.data.len() as u64;
                stats.blocks_written += 1;
            }
        }
    }

    stats
}
