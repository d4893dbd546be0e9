//! Pipeline coordinator: owns the queue, the signals and the role threads.
//!
//! One invocation moves through `Idle -> Initialized -> Running` and ends in
//! exactly one of `Completed`, `Failed` or `Canceled`.  The reader and the
//! transform workers run as scoped threads; the writer runs on the scope's
//! own thread, mirroring the worker/writer split of a create-archive run.
//! Scoped threads guarantee every role is joined before `run` returns, so
//! queue, signals and stream borrows are released on every exit path.

use std::io::{Read, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use tracing::debug;

use crate::block::{BlockCell, BlockStatus};
use crate::error::PipelineError;
use crate::memory::MemoryProbe;
use crate::queue::{
    BlockQueue, QueueConfig, DEFAULT_OVERFULL_FACTOR, DEFAULT_PRESSURE_THRESHOLD,
};
use crate::reader::{run_reader, ChunkPolicy};
use crate::signal::{CancelToken, ErrorSlot};
use crate::transform::{BlockTransform, ZstdCompress, ZstdDecompress};
use crate::workers::{run_worker, worker_count};
use crate::writer::run_writer;

/// Default chunk size read from the source per block (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

/// The built-in processing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    /// Pass blocks through untouched; blocks are ready as soon as read.
    Copy,
    /// Compress each block with zstd at the given level.
    Compress { level: i32 },
    /// Decompress length-prefixed zstd records back to the original bytes.
    Decompress,
}

/// How a run terminated. Cancellation is a first-class outcome, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Completed,
    Canceled,
}

/// Terminal result of a successful (or canceled) run.
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub status: PipelineStatus,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub blocks_written: u64,
    pub elapsed: Duration,
}

/// Configures and runs one pipeline invocation.
pub struct PipelineBuilder {
    chunk_size: usize,
    workers: usize,
    overfull_factor: usize,
    pressure_threshold: f64,
    probe: Option<MemoryProbe>,
    transform: Option<Arc<dyn BlockTransform>>,
    policy: Option<ChunkPolicy>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        PipelineBuilder {
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: 0,
            overfull_factor: DEFAULT_OVERFULL_FACTOR,
            pressure_threshold: DEFAULT_PRESSURE_THRESHOLD,
            probe: None,
            transform: None,
            policy: None,
        }
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        PipelineBuilder::default()
    }

    /// Builder preconfigured for one of the built-in modes.
    pub fn for_mode(mode: ProcessingMode) -> Self {
        let builder = PipelineBuilder::new();
        match mode {
            ProcessingMode::Copy => builder,
            ProcessingMode::Compress { level } => {
                builder.transform(Arc::new(ZstdCompress::new(level)))
            }
            ProcessingMode::Decompress => builder
                .transform(Arc::new(ZstdDecompress))
                .chunk_policy(ChunkPolicy::LengthPrefixed),
        }
    }

    /// Bytes read from the source per block. Ignored by the length-prefixed
    /// chunk policy. [default: 1 MiB]
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    /// Number of transform workers. [0 = one per available CPU]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Hard backpressure cap as a multiple of the worker count.
    pub fn overfull_factor(mut self, factor: usize) -> Self {
        self.overfull_factor = factor;
        self
    }

    /// Memory pressure (0.0-1.0) above which the soft backpressure tier
    /// engages.
    pub fn pressure_threshold(mut self, threshold: f64) -> Self {
        self.pressure_threshold = threshold;
        self
    }

    /// Replace the live memory probe, e.g. with `MemoryProbe::fixed(0.0)` to
    /// disable the memory tier.
    pub fn memory_probe(mut self, probe: MemoryProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Install a custom per-block transform.
    pub fn transform(mut self, transform: Arc<dyn BlockTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Override how the reader delimits blocks.
    pub fn chunk_policy(mut self, policy: ChunkPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Run the pipeline to its terminal state, consuming the builder.
    ///
    /// Returns `Ok` with a `Completed` or `Canceled` summary, or the first
    /// recorded failure. When a failure and a cancellation race, the failure
    /// wins.
    pub fn run<R, W>(
        self,
        source: &mut R,
        target: &mut W,
        cancel: &CancelToken,
    ) -> Result<PipelineSummary, PipelineError>
    where
        R: Read + Send,
        W: Write,
    {
        let started = Instant::now();
        let pool_size = worker_count(self.workers);
        let has_transform = self.transform.is_some();
        let ready_status = if has_transform {
            BlockStatus::Processed
        } else {
            BlockStatus::ReadDone
        };
        let policy = self
            .policy
            .unwrap_or(ChunkPolicy::Fixed(self.chunk_size));

        let queue = BlockQueue::new(
            QueueConfig {
                workers: pool_size,
                overfull_factor: self.overfull_factor,
                pressure_threshold: self.pressure_threshold,
                ready_status,
            },
            self.probe.unwrap_or_default(),
        );
        let errors = ErrorSlot::new();
        cancel.attach(Arc::clone(&queue));
        debug!(
            workers = if has_transform { pool_size } else { 0 },
            ?policy,
            "pipeline initialized"
        );

        let transform = self.transform;
        let (bytes_read, writer_stats) = thread::scope(|s| {
            let errors = &errors;
            let queue = &queue;

            let mut worker_handles = Vec::new();
            let dispatch = transform.as_ref().map(|transform| {
                let (tx, rx) = bounded::<Arc<BlockCell>>(pool_size);
                for _ in 0..pool_size {
                    let rx = rx.clone();
                    let transform = Arc::clone(transform);
                    worker_handles.push(s.spawn(move || {
                        run_worker(rx, transform.as_ref(), queue, errors, cancel);
                    }));
                }
                tx
            });

            let reader_handle = s.spawn(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    run_reader(
                        source,
                        policy,
                        BlockStatus::ReadDone,
                        queue,
                        dispatch.as_ref(),
                        errors,
                        cancel,
                    )
                }));
                // Dropping the dispatch sender here hangs up the worker
                // channel, which is what lets the pool drain and exit.
                drop(dispatch);
                match outcome {
                    Ok(bytes) => bytes,
                    Err(_) => {
                        errors.record(PipelineError::WorkerPanic);
                        queue.interrupt();
                        0
                    }
                }
            });

            let writer_stats = run_writer(target, queue, errors);

            let bytes_read = reader_handle.join().unwrap_or_else(|_| {
                errors.record(PipelineError::WorkerPanic);
                queue.interrupt();
                0
            });
            for handle in worker_handles {
                if handle.join().is_err() {
                    errors.record(PipelineError::WorkerPanic);
                }
            }
            (bytes_read, writer_stats)
        });
        cancel.detach();

        if let Some(err) = errors.take() {
            debug!("pipeline failed: {err}");
            return Err(err);
        }

        let status = if cancel.is_canceled() {
            PipelineStatus::Canceled
        } else {
            PipelineStatus::Completed
        };
        debug!(?status, bytes_read, "pipeline finished");
        Ok(PipelineSummary {
            status,
            bytes_read,
            bytes_written: writer_stats.bytes_written,
            blocks_written: writer_stats.blocks_written,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_mode_has_no_transform_and_fixed_chunks() {
        let builder = PipelineBuilder::for_mode(ProcessingMode::Copy);
        assert!(builder.transform.is_none());
        assert!(builder.policy.is_none());
    }

    #[test]
    fn decompress_mode_uses_length_prefixed_records() {
        let builder = PipelineBuilder::for_mode(ProcessingMode::Decompress);
        assert!(builder.transform.is_some());
        assert_eq!(builder.policy, Some(ChunkPolicy::LengthPrefixed));
    }

    #[test]
    fn chunk_size_never_drops_to_zero() {
        let builder = PipelineBuilder::new().chunk_size(0);
        assert_eq!(builder.chunk_size, 1);
    }
}
