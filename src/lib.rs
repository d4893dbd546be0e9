//! # blockpipe Core Library
//!
//! This crate provides a bounded, order-preserving, parallel block-processing
//! pipeline used to copy, compress or decompress a byte stream.
//!
//! It is designed to be used by the `blockpipe` command-line application, but
//! its public API can also be used to run pipelines over any `Read`/`Write`
//! pair programmatically.
//!
//! ## Key Modules
//!
//! - [`pipeline`]: The coordinator that wires the roles together and produces
//!   the single terminal result.
//! - [`queue`]: The bounded ordered queue whose head-only dequeue rule
//!   enforces output order.
//! - [`reader`], [`writer`], [`workers`]: The three cooperating roles.
//! - [`transform`]: The per-block transform trait and the zstd pair.
//! - [`signal`]: Cancellation token and single-assignment error slot.
//!
//! ## Examples
//!
//! ```no_run
//! use blockpipe::{CancelToken, PipelineBuilder, ProcessingMode};
//!
//! let mut source = std::fs::File::open("input.bin").unwrap();
//! let mut target = std::fs::File::create("output.zst").unwrap();
//! let summary = PipelineBuilder::for_mode(ProcessingMode::Compress { level: 3 })
//!     .run(&mut source, &mut target, &CancelToken::new())
//!     .unwrap();
//! println!("wrote {} blocks", summary.blocks_written);
//! ```

pub mod block;
pub mod cli;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod queue;
pub mod reader;
pub mod signal;
pub mod transform;
pub mod workers;
pub mod writer;

pub use block::{Block, BlockStatus};
pub use error::PipelineError;
pub use memory::MemoryProbe;
pub use pipeline::{PipelineBuilder, PipelineStatus, PipelineSummary, ProcessingMode};
pub use reader::ChunkPolicy;
pub use signal::{CancelToken, ErrorSlot};
pub use transform::{BlockTransform, TransformError, ZstdCompress, ZstdDecompress};
